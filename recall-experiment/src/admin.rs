use tracing::{info, warn};

/// Plain-code gate in front of the admin controls.
///
/// An unset or blank code disables admin entirely.
#[derive(Debug, Clone, Default)]
pub struct AdminGate {
    code: Option<String>,
    unlocked: bool,
}

impl AdminGate {
    pub fn new(code: Option<String>) -> Self {
        let code = code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self {
            code,
            unlocked: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.code.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn unlock(&mut self, attempt: &str) -> bool {
        match &self.code {
            Some(code) if code == attempt.trim() => {
                info!("admin unlocked");
                self.unlocked = true;
            }
            Some(_) => warn!("wrong admin code"),
            None => warn!("admin is disabled"),
        }
        self.unlocked
    }

    pub fn lock(&mut self) {
        self.unlocked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_code_disables_admin() {
        let mut gate = AdminGate::new(Some("  ".into()));
        assert!(!gate.is_enabled());
        assert!(!gate.unlock(""));
        assert!(!AdminGate::new(None).is_enabled());
    }

    #[test]
    fn unlocks_with_the_configured_code() {
        let mut gate = AdminGate::new(Some("4321".into()));
        assert!(!gate.unlock("1234"));
        assert!(gate.unlock(" 4321 "));
        gate.lock();
        assert!(!gate.is_unlocked());
    }
}
