use chrono::NaiveDate;
use sha2::{Digest as _, Sha256};

use super::non_empty;
use crate::formats::{CleanPartner, RawPartner};

/// One-way, salted fingerprint of a partner contact.
pub fn contact_hash(name: &str, email: &str, phone: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{name}|{email}|{phone}|{salt}").as_bytes());
    hex::encode(digest)
}

fn trimmed(value: Option<&str>) -> &str {
    value.unwrap_or_default().trim()
}

fn parse_partnership_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

pub fn transform_partners(raw: &[RawPartner], salt: &str) -> Vec<CleanPartner> {
    let clean: Vec<CleanPartner> = raw
        .iter()
        .filter_map(|partner| {
            let nom_librairie = non_empty(partner.nom_librairie.as_deref())?;
            let adresse = non_empty(partner.adresse.as_deref())?;

            let hash = contact_hash(
                trimmed(partner.contact_nom.as_deref()),
                trimmed(partner.contact_email.as_deref()),
                trimmed(partner.contact_telephone.as_deref()),
                salt,
            );

            let date_partenariat = partner.date_partenariat.as_deref().and_then(|raw| {
                let parsed = parse_partnership_date(raw);
                if parsed.is_none() && !raw.trim().is_empty() {
                    tracing::debug!(value = raw, "unparseable partnership date");
                }
                parsed
            });

            Some(CleanPartner {
                nom_librairie,
                adresse,
                code_postal: non_empty(partner.code_postal.as_deref()),
                ville: non_empty(partner.ville.as_deref()),
                specialite: non_empty(partner.specialite.as_deref()),
                ca_annuel: partner.ca_annuel,
                date_partenariat,
                contact_hash: hash,
            })
        })
        .collect();

    tracing::info!(valid = clean.len(), total = raw.len(), "partners transformed");
    clean
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawPartner {
        RawPartner {
            nom_librairie: Some(" Librairie du Centre ".to_owned()),
            adresse: Some("12 rue de la Paix ".to_owned()),
            code_postal: Some(" 75002".to_owned()),
            ville: Some("Paris".to_owned()),
            contact_nom: Some(" Jeanne Martin ".to_owned()),
            contact_email: Some("jeanne@example.fr".to_owned()),
            contact_telephone: Some("0612345678".to_owned()),
            ca_annuel: Some(125000.0),
            date_partenariat: Some("2021-05-04 00:00:00".to_owned()),
            specialite: Some("  ".to_owned()),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(
            contact_hash("n", "e", "p", "s"),
            contact_hash("n", "e", "p", "s")
        );
        assert_eq!(contact_hash("n", "e", "p", "s").len(), 64);
    }

    #[test]
    fn hash_changes_with_each_input() {
        let base = contact_hash("n", "e", "p", "s");
        assert_ne!(base, contact_hash("N", "e", "p", "s"));
        assert_ne!(base, contact_hash("n", "E", "p", "s"));
        assert_ne!(base, contact_hash("n", "e", "P", "s"));
        assert_ne!(base, contact_hash("n", "e", "p", "S"));
    }

    #[test]
    fn hash_matches_sha256_of_pipe_joined_fields() {
        let expected = hex::encode(Sha256::digest(b"Jeanne Martin|jeanne@example.fr|0612345678|salt"));
        let clean = transform_partners(&[raw()], "salt");
        assert_eq!(clean[0].contact_hash, expected);
    }

    #[test]
    fn clean_partner_is_normalized_and_carries_no_contact_fields() -> anyhow::Result<()> {
        let clean = transform_partners(&[raw()], "salt");

        assert_eq!(clean.len(), 1);
        let partner = &clean[0];
        assert_eq!(partner.nom_librairie, "Librairie du Centre");
        assert_eq!(partner.adresse, "12 rue de la Paix");
        assert_eq!(partner.code_postal.as_deref(), Some("75002"));
        assert_eq!(partner.specialite, None);
        assert_eq!(partner.date_partenariat, NaiveDate::from_ymd_opt(2021, 5, 4));

        let json = serde_json::to_string(partner)?;
        assert!(!json.contains("Jeanne"));
        assert!(!json.contains("jeanne@example.fr"));
        assert!(!json.contains("0612345678"));
        Ok(())
    }

    #[test]
    fn partners_without_name_or_address_are_dropped() {
        let mut no_name = raw();
        no_name.nom_librairie = Some("   ".to_owned());
        let mut no_address = raw();
        no_address.adresse = None;

        assert!(transform_partners(&[no_name, no_address], "salt").is_empty());
    }

    #[test]
    fn dates_accept_common_formats() {
        assert_eq!(
            parse_partnership_date("04/05/2021"),
            NaiveDate::from_ymd_opt(2021, 5, 4)
        );
        assert_eq!(
            parse_partnership_date("2021-05-04T10:00:00"),
            NaiveDate::from_ymd_opt(2021, 5, 4)
        );
        assert_eq!(parse_partnership_date("soon"), None);
    }
}
