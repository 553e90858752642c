// Session liveness flag shared by every task spawned for one room.
//
// Retiring is synchronous and one-way. Timers and callbacks that fire
// afterwards check `is_live()` and turn into no-ops; long waits can select on
// `retired()` to wake up promptly.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Liveness {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_live(&self) -> bool {
        *self.tx.borrow()
    }

    /// Mark the owner dead. Returns `true` if this call did the retiring.
    pub fn retire(&self) -> bool {
        self.tx.send_replace(false)
    }

    /// Whether both handles share one flag.
    pub fn same_as(&self, other: &Liveness) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }

    /// Resolves once `retire()` has been called (immediately if it already was).
    pub async fn retired(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|live| !*live).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn retire_is_one_way() {
        let liveness = Liveness::new();
        assert!(liveness.is_live());
        assert!(liveness.retire());
        assert!(!liveness.is_live());
        assert!(!liveness.retire(), "second retire reports it was already dead");
    }

    #[test]
    fn clones_share_state() {
        let liveness = Liveness::new();
        let clone = liveness.clone();
        clone.retire();
        assert!(!liveness.is_live());
    }

    #[test]
    fn identity_follows_clones() {
        let liveness = Liveness::new();
        assert!(liveness.same_as(&liveness.clone()));
        assert!(!liveness.same_as(&Liveness::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn retired_wakes_waiters() {
        let liveness = Liveness::new();
        let waiter = {
            let liveness = liveness.clone();
            tokio::spawn(async move { liveness.retired().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        liveness.retire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn retired_returns_immediately_when_already_dead() {
        let liveness = Liveness::new();
        liveness.retire();
        liveness.retired().await;
    }
}
