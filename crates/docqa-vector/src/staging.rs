//! Ordered write log shared by the staged stores.
//!
//! Ops are applied front to back and each one leaves the log only after it
//! committed. A failure stops the run with the failed op still at the front,
//! so a later `flush` resumes where the previous one stopped.

use std::collections::VecDeque;

use async_trait::async_trait;
use docqa_core::Result;

#[async_trait]
pub(crate) trait ApplyOp<Op: Sync>: Sync {
    async fn apply(&self, op: &Op) -> Result<()>;
}

/// Applies `ops` in order; returns how many committed.
pub(crate) async fn apply_in_order<Op, A>(ops: &mut VecDeque<Op>, target: &A) -> Result<usize>
where
    Op: Sync + Send,
    A: ApplyOp<Op>,
{
    let mut applied = 0;
    while let Some(op) = ops.front() {
        target.apply(op).await?;
        ops.pop_front();
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use docqa_core::Error;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        committed: Mutex<Vec<u32>>,
        reject: Mutex<Option<u32>>,
    }

    #[async_trait]
    impl ApplyOp<u32> for Recorder {
        async fn apply(&self, op: &u32) -> Result<()> {
            if *self.reject.lock().unwrap() == Some(*op) {
                return Err(Error::StoreUnavailable(format!("op {op} rejected")));
            }
            self.committed.lock().unwrap().push(*op);
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_op_and_tail_stay_queued() {
        let target = Recorder::default();
        *target.reject.lock().unwrap() = Some(2);
        let mut ops: VecDeque<u32> = VecDeque::from(vec![1, 2, 3]);

        let err = apply_in_order(&mut ops, &target).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(_)));
        assert_eq!(*target.committed.lock().unwrap(), vec![1]);
        assert_eq!(ops, VecDeque::from(vec![2, 3]));

        *target.reject.lock().unwrap() = None;
        assert_eq!(apply_in_order(&mut ops, &target).await.unwrap(), 2);
        assert_eq!(*target.committed.lock().unwrap(), vec![1, 2, 3]);
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn empty_log_is_a_no_op() {
        let mut ops: VecDeque<u32> = VecDeque::new();
        assert_eq!(apply_in_order(&mut ops, &Recorder::default()).await.unwrap(), 0);
    }
}
