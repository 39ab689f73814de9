// ABOUTME: Command module aggregator for the lakeship CLI.
// ABOUTME: Re-exports the deploy and rollback command handlers.

mod deploy;
mod rollback;

pub use deploy::{DeployRequest, deploy};
pub use rollback::{RollbackRequest, rollback};

use lakeship::deploy::{CONFIRMATION_TOKEN, read_confirmation};
use lakeship::interrupt::Interrupt;
use std::io::{self, BufRead, Write};

/// Ask the operator to type the confirmation token.
///
/// The blocking read runs off the runtime so an interrupt while the prompt
/// is waiting is a refusal instead of a hang.
async fn confirm<R>(prompt: &str, input: R, interrupt: &Interrupt) -> io::Result<bool>
where
    R: BufRead + Send + 'static,
{
    let mut stderr = io::stderr();
    write!(
        stderr,
        "{} Type '{}' to continue: ",
        prompt, CONFIRMATION_TOKEN
    )?;
    stderr.flush()?;

    let read = tokio::task::spawn_blocking(move || {
        let mut input = input;
        read_confirmation(&mut input)
    });

    tokio::select! {
        answer = read => answer.map_err(io::Error::other)?,
        _ = interrupt.triggered() => {
            let _ = writeln!(stderr);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};
    use std::time::Duration;

    /// Reader that stalls like a terminal nobody is typing into.
    struct Stalled(Duration);

    impl Read for Stalled {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(self.0);
            let answer = b"yes\n";
            buf[..answer.len()].copy_from_slice(answer);
            Ok(answer.len())
        }
    }

    #[tokio::test]
    async fn typed_token_confirms() {
        let interrupt = Interrupt::new();
        assert!(
            confirm("Deploy?", Cursor::new("yes\n"), &interrupt)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn interrupt_while_waiting_refuses() {
        let interrupt = Interrupt::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        });

        let input = BufReader::new(Stalled(Duration::from_millis(500)));
        let answer = tokio::time::timeout(
            Duration::from_millis(300),
            confirm("Deploy?", input, &interrupt),
        )
        .await
        .expect("prompt should give up once interrupted");
        assert!(!answer.unwrap());
    }
}
