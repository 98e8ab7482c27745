use embedded_hal::delay::DelayNs;

/// Polls `cond` up to `iterations` times, waiting `step_us` between
/// attempts. Returns `Ok(false)` if the condition never held.
pub fn poll<D, E, F>(delay: &mut D, iterations: u32, step_us: u32, mut cond: F) -> Result<bool, E>
    where D: DelayNs, F: FnMut() -> Result<bool, E>
{
    for _ in 0..iterations {
        if cond()? {
            return Ok(true)
        }
        delay.delay_us(step_us);
    }
    Ok(false)
}

pub fn spin_ms<D: DelayNs>(delay: &mut D, ms: u32) {
    delay.delay_ms(ms)
}
