//! Optional staff gate: a single shared passphrase exchanged for a
//! hashed cookie token. When no passphrase is configured the interface
//! is open.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const STAFF_COOKIE: &str = "naskah_staff";

#[derive(Clone)]
pub struct StaffGate {
    token: Option<String>,
}

impl StaffGate {
    pub fn new(passphrase: Option<&str>) -> Self {
        Self {
            token: passphrase.map(hash_token),
        }
    }

    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Exchange the submitted passphrase for the cookie token.
    pub fn exchange(&self, passphrase: &str) -> Option<String> {
        let token = self.token.as_ref()?;
        let candidate = hash_token(passphrase);
        constant_time_eq(token, &candidate).then(|| token.clone())
    }

    /// Check a presented cookie token; an open gate accepts everything.
    pub fn accepts(&self, cookie: Option<&str>) -> bool {
        match (&self.token, cookie) {
            (None, _) => true,
            (Some(token), Some(presented)) => constant_time_eq(token, presented),
            (Some(_), None) => false,
        }
    }
}

fn hash_token(passphrase: &str) -> String {
    let digest = Sha256::digest(passphrase.trim().as_bytes());
    hex::encode(digest)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_gate_accepts_any_visitor() {
        let gate = StaffGate::new(None);
        assert!(!gate.enabled());
        assert!(gate.accepts(None));
        assert!(gate.accepts(Some("anything")));
    }

    #[test]
    fn closed_gate_requires_the_exchanged_token() {
        let gate = StaffGate::new(Some("rahasia sekolah"));
        assert!(gate.enabled());
        assert!(!gate.accepts(None));
        assert!(!gate.accepts(Some("wrong")));

        let token = gate.exchange("rahasia sekolah").expect("valid passphrase");
        assert!(gate.accepts(Some(&token)));
    }

    #[test]
    fn wrong_passphrase_yields_no_token() {
        let gate = StaffGate::new(Some("rahasia"));
        assert!(gate.exchange("salah").is_none());
    }

    #[test]
    fn passphrase_is_trimmed_before_hashing() {
        let gate = StaffGate::new(Some("rahasia"));
        assert!(gate.exchange("  rahasia  ").is_some());
    }
}
