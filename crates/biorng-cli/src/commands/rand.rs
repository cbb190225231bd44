use super::{CommandResult, finish, make_rng, runtime, timeout_from_ms};
use crate::SourceArgs;

pub fn run(args: &SourceArgs, count: usize, timeout_ms: u64) -> CommandResult {
    let limit = timeout_from_ms(timeout_ms);
    runtime()?.block_on(async {
        let rng = make_rng(args)?;
        for _ in 0..count {
            let value = match limit {
                Some(limit) => rng.rand_timeout(limit).await?,
                None => rng.rand().await?,
            };
            println!("{value:.12}");
        }
        finish(rng).await
    })
}
