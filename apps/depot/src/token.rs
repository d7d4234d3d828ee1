//! Attendance scan tokens.
//!
//! The QR code at the door encodes a token that is only valid for the
//! current local work date:
//!
//! ```text
//!   token = hex( HMAC-SHA256( secret, "attendance:" + YYYY-MM-DD ) )
//! ```
//!
//! A photo of yesterday's code is useless today, and nothing has to be
//! stored server-side.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize)]
pub struct ScanToken {
    pub token: String,
    pub work_date: NaiveDate,
    /// Local midnight at the end of `work_date`, in UTC.
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ScanTokens {
    secret: Vec<u8>,
    offset: FixedOffset,
}

impl std::fmt::Debug for ScanTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanTokens").field("offset", &self.offset).finish_non_exhaustive()
    }
}

impl ScanTokens {
    pub fn new(secret: &str, offset: FixedOffset) -> Self {
        ScanTokens {
            secret: secret.as_bytes().to_vec(),
            offset,
        }
    }

    fn mac(&self, work_date: NaiveDate) -> Result<HmacSha256, ApiError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiError::Internal(format!("scan token key: {e}")))?;
        mac.update(format!("attendance:{work_date}").as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, work_date: NaiveDate) -> Result<ScanToken, ApiError> {
        let token = hex::encode(self.mac(work_date)?.finalize().into_bytes());
        Ok(ScanToken {
            token,
            work_date,
            expires_at: self.end_of_day(work_date),
        })
    }

    /// Constant-time check that `token` belongs to `work_date`.
    pub fn verify(&self, token: &str, work_date: NaiveDate) -> Result<(), ApiError> {
        let invalid = || ApiError::InvalidToken("Scan code is invalid or expired".to_string());
        let bytes = hex::decode(token.trim()).map_err(|_| invalid())?;
        self.mac(work_date)?.verify_slice(&bytes).map_err(|_| invalid())
    }

    fn end_of_day(&self, work_date: NaiveDate) -> DateTime<Utc> {
        let next = (work_date + Duration::days(1)).and_time(NaiveTime::MIN);
        self.offset
            .from_local_datetime(&next)
            .single()
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(|| next.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> ScanTokens {
        ScanTokens::new("secret", FixedOffset::east_opt(3 * 3600).unwrap())
    }

    #[test]
    fn test_token_valid_only_for_its_day() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let issued = tokens().issue(day).unwrap();

        assert_eq!(issued.token.len(), 64);
        assert!(tokens().verify(&issued.token, day).is_ok());
        assert!(tokens().verify(&issued.token, day.succ_opt().unwrap()).is_err());
        assert!(tokens().verify("not-hex", day).is_err());
    }

    #[test]
    fn test_other_secret_rejected() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let issued = tokens().issue(day).unwrap();
        let other = ScanTokens::new("other", FixedOffset::east_opt(0).unwrap());
        assert!(other.verify(&issued.token, day).is_err());
    }

    #[test]
    fn test_expiry_is_local_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let issued = tokens().issue(day).unwrap();
        assert_eq!(issued.expires_at, Utc.with_ymd_and_hms(2024, 5, 6, 21, 0, 0).unwrap());
    }
}
