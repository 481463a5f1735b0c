use crate::formats::{GeocodeHit, PartnerAddress, PartnerGeocoding};

pub fn geocode_query(partner: &PartnerAddress) -> String {
    [
        Some(partner.adresse.as_str()),
        partner.code_postal.as_deref(),
        partner.ville.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

pub fn enrichment_row(partner: &PartnerAddress, hit: GeocodeHit) -> PartnerGeocoding {
    PartnerGeocoding {
        partner_id: partner.partner_id,
        label: hit.label,
        score: hit.score,
        lon: hit.lon,
        lat: hit.lat,
    }
}
