//! TOTP secret generation, provisioning QR codes and code verification.

use anyhow::{Result, anyhow};
use rand::Rng;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::config::TotpConfig;

/// What a freshly registered user needs to enrol an authenticator app.
#[derive(Debug, Clone)]
pub struct Provisioning {
    /// `otpauth://` URI encoded in the QR code.
    pub uri: String,

    /// PNG QR code, base64 encoded (no `data:` prefix).
    pub qr_png_base64: String,
}

impl Provisioning {
    #[must_use]
    pub fn qr_data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.qr_png_base64)
    }
}

#[derive(Debug, Clone)]
pub struct TotpService {
    config: TotpConfig,
}

impl TotpService {
    #[must_use]
    pub const fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    /// Random unpadded base32 secret, `secret_length` characters long.
    /// Each character carries 5 bits, so the length must be a multiple of 8.
    #[must_use]
    pub fn generate_secret(&self) -> String {
        let mut bytes = vec![0u8; self.config.secret_length * 5 / 8];
        rand::rng().fill(bytes.as_mut_slice());
        Secret::Raw(bytes).to_encoded().to_string()
    }

    pub fn provisioning(&self, secret: &str, account_name: &str) -> Result<Provisioning> {
        let totp = self.build(secret, account_name)?;
        let qr_png_base64 = totp
            .get_qr_base64()
            .map_err(|e| anyhow!("QR gen error: {e}"))?;

        Ok(Provisioning {
            uri: totp.get_url(),
            qr_png_base64,
        })
    }

    /// Checks `code` against the current step, allowing `skew` steps of drift.
    pub fn verify(&self, secret: &str, code: &str) -> Result<bool> {
        let code = code.trim();
        if code.len() != self.config.digits || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }

        let totp = self.build(secret, "user")?;
        totp.check_current(code)
            .map_err(|e| anyhow!("System clock error: {e}"))
    }

    /// Current code for `secret`. Used by tooling and tests.
    pub fn current_code(&self, secret: &str) -> Result<String> {
        self.build(secret, "user")?
            .generate_current()
            .map_err(|e| anyhow!("System clock error: {e}"))
    }

    fn build(&self, secret: &str, account_name: &str) -> Result<TOTP> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| anyhow!("Invalid TOTP secret: {e:?}"))?;

        // 80-bit secrets are below the checked constructor's 128-bit minimum.
        Ok(TOTP::new_unchecked(
            Algorithm::SHA1,
            self.config.digits,
            self.config.skew,
            self.config.step_seconds,
            secret_bytes,
            Some(self.config.issuer.clone()),
            account_name.to_string(),
        ))
    }
}
