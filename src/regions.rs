use crate::error::{Error, Result};

/// region codes look like `us-east-1` or `us-gov-west-1`: a two letter
/// partition prefix, one or more lowercase words, then a number. New regions
/// keep appearing, so only the shape is checked.
pub fn is_valid_region(r: &str) -> bool {
    let parts: Vec<&str> = r.split('-').collect();
    if parts.len() < 3 {
        return false;
    }
    let (prefix, rest) = (parts[0], &parts[1..]);
    let Some((number, words)) = rest.split_last() else {
        return false;
    };
    prefix.len() == 2
        && prefix.chars().all(|c| c.is_ascii_lowercase())
        && words.iter().all(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_lowercase()))
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

pub fn verify_region(r: &str) -> Result<()> {
    if !is_valid_region(r) {
        return Err(Error::InvalidEnvironment(format!("Invalid region code {:?}\nMust look like us-east-1", r)));
    }
    Ok(())
}

/// account ids are exactly 12 digits.
pub fn verify_account(account: &str) -> Result<()> {
    if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidEnvironment(format!("Invalid account id {:?}\nMust be 12 digits", account)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_regions_pass() {
        assert!(verify_region("us-east-1").is_ok());
        assert!(verify_region("eu-central-2").is_ok());
        assert!(verify_region("us-gov-west-1").is_ok());
    }

    #[test]
    fn newer_regions_pass() {
        for region in ["ap-southeast-5", "ap-southeast-7", "mx-central-1"] {
            assert!(verify_region(region).is_ok(), "{region}");
        }
    }

    #[test]
    fn malformed_regions_fail() {
        for region in ["US-EAST-1", "us-east", "useast1", "nowhere-1", "mars-north-1", "us--1", "us-east-x", ""] {
            assert!(verify_region(region).is_err(), "{region}");
        }
        let err = verify_region("us-east").unwrap_err();
        assert!(err.to_string().contains("us-east-1"));
    }

    #[test]
    fn account_must_be_twelve_digits() {
        assert!(verify_account("123456789012").is_ok());
        assert!(verify_account("12345678901").is_err());
        assert!(verify_account("12345678901a").is_err());
    }
}
