//! Storage health check

use anyhow::Result;
use opendal::Operator;

/// Verify the bucket is reachable by listing its root
pub async fn check_health(op: &Operator) -> Result<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("storage health check failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_operator_is_healthy() {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        assert!(check_health(&op).await.is_ok());
    }
}
