use super::{CommandResult, finish, make_rng, runtime, timeout_from_ms};
use crate::SourceArgs;

pub fn run(args: &SourceArgs, min: i64, max: i64, count: usize, timeout_ms: u64) -> CommandResult {
    if min > max {
        return Err(format!("--min {min} is greater than --max {max}").into());
    }
    let limit = timeout_from_ms(timeout_ms);
    runtime()?.block_on(async {
        let rng = make_rng(args)?;
        for _ in 0..count {
            let value = match limit {
                Some(limit) => rng.rand_int_timeout(min, max, limit).await?,
                None => rng.rand_int(min, max).await?,
            };
            println!("{value}");
        }
        finish(rng).await
    })
}
