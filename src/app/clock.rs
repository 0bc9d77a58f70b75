use esp_hal::{delay::Delay, rng::Rng, time::Instant};

use relink::session::hal::{EntropySource, Monotonic};

pub(crate) struct HalClock {
    delay: Delay,
}

impl HalClock {
    pub(crate) fn new() -> Self {
        Self {
            delay: Delay::new(),
        }
    }
}

impl Monotonic for HalClock {
    fn now_ms(&mut self) -> u64 {
        Instant::now().duration_since_epoch().as_millis()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_millis(ms);
    }
}

pub(crate) struct HalEntropy {
    rng: Rng,
}

impl HalEntropy {
    pub(crate) fn new() -> Self {
        Self { rng: Rng::new() }
    }
}

impl EntropySource for HalEntropy {
    fn random_u32(&mut self) -> u32 {
        self.rng.random()
    }
}
