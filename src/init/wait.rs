// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::error;

use crate::receivers::file::error::{Error, Result};

pub async fn wait_for_tasks_with_timeout(
    tasks: &mut JoinSet<Result<()>>,
    timeout: Duration,
) -> Result<()> {
    wait_for_tasks_with_deadline(tasks, Instant::now() + timeout).await
}

/// Join every task, keeping the last failure.
pub async fn wait_for_tasks_with_deadline(
    tasks: &mut JoinSet<Result<()>>,
    stop_at: Instant,
) -> Result<()> {
    let mut result = Ok(());
    loop {
        match timeout_at(stop_at, tasks.join_next()).await {
            Err(_) => {
                tasks.abort_all();
                result = Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out waiting for tasks to complete",
                )));
                break;
            }
            Ok(None) => break,
            Ok(Some(v)) => match v {
                Ok(Ok(())) => {}
                Ok(Err(e)) => result = Err(e),
                Err(e) => {
                    error!("Failed to join with task: {:?}", e)
                }
            },
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_keeps_task_error() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { Ok(()) });
        tasks.spawn(async { Err(Error::StoreClosed) });

        let result = wait_for_tasks_with_timeout(&mut tasks, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::StoreClosed)));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });

        let result = wait_for_tasks_with_timeout(&mut tasks, Duration::from_millis(10)).await;
        assert!(result.is_err());
    }
}
