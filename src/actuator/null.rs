//! アクチュエータ無しで動かすための実装

use async_trait::async_trait;

use super::{Actuator, ActuatorError};

/// コマンドをログに出すだけのアクチュエータ
#[derive(Debug, Default, Clone)]
pub struct NullActuator;

#[async_trait]
impl Actuator for NullActuator {
    async fn send_command(&self, command: &str) -> Result<(), ActuatorError> {
        tracing::info!("🔇 Actuator disabled, dropping command: {}", command);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_actuator_accepts_commands() {
        let actuator = NullActuator;
        assert!(actuator.send_command("KEY:A:hello").await.is_ok());
        assert_eq!(actuator.name(), "null");
    }
}
