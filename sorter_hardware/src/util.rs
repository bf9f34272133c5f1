use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use sorter_traits::Clock;

use crate::error::{BusError, Line};

const POLL: Duration = Duration::from_micros(1);

/// Wait until the released `line` reads high (a slave may be stretching the
/// clock), or fail with `BusError::Stuck` once `timeout` elapses.
pub fn wait_until_high_with_timeout(
    mut is_high: impl FnMut() -> bool,
    line: Line,
    timeout: Duration,
    clock: &dyn Clock,
) -> Result<(), BusError> {
    let deadline = clock.now() + timeout;
    while !is_high() {
        if clock.now() >= deadline {
            return Err(BusError::Stuck { line });
        }
        clock.sleep(POLL);
    }
    Ok(())
}

/// Replace `path` with `bytes` via write-to-temp + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}
