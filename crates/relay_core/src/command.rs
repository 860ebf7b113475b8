/// Inbound payload classification. Matching is exact except for the
/// `FOG_BLOCK` prefix family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Authorize,
    Block,
    Deny,
    Stop,
    Unrecognized,
}

const FOG_BLOCK_PREFIX: &str = "FOG_BLOCK";

impl Command {
    pub fn classify(payload: &str) -> Self {
        match payload {
            "Authorized" => Command::Authorize,
            "BLOCKED" => Command::Block,
            "DENIED" | "UNAUTHORIZED" => Command::Deny,
            "ENV_OK" | "STOP" | "IDLE" => Command::Stop,
            other if other.starts_with(FOG_BLOCK_PREFIX) => Command::Block,
            _ => Command::Unrecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_payloads() {
        assert_eq!(Command::classify("Authorized"), Command::Authorize);
        assert_eq!(Command::classify("BLOCKED"), Command::Block);
        assert_eq!(Command::classify("DENIED"), Command::Deny);
        assert_eq!(Command::classify("UNAUTHORIZED"), Command::Deny);
        for stop in ["ENV_OK", "STOP", "IDLE"] {
            assert_eq!(Command::classify(stop), Command::Stop);
        }
    }

    #[test]
    fn fog_block_matches_by_prefix() {
        assert_eq!(Command::classify("FOG_BLOCK"), Command::Block);
        assert_eq!(Command::classify("FOG_BLOCK_ZONE_3"), Command::Block);
        assert_eq!(Command::classify("fog_block"), Command::Unrecognized);
    }

    #[test]
    fn matching_is_case_and_whitespace_sensitive() {
        assert_eq!(Command::classify("authorized"), Command::Unrecognized);
        assert_eq!(Command::classify("BLOCKED "), Command::Unrecognized);
        assert_eq!(Command::classify("AUTHORIZED"), Command::Unrecognized);
        assert_eq!(Command::classify(""), Command::Unrecognized);
    }
}
