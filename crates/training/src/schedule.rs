/// Warm-up then progressive adaptation: the adversarial weight ramps up along
/// `2 / (1 + e^(-10p)) - 1` and the learning rate decays as `(1 + 10p)^(-0.75)`,
/// where `p` is the fraction of adaptation batches seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptSchedule {
    pub init_epochs: usize,
    pub adapt_epochs: usize,
    pub batches_per_epoch: usize,
    pub init_lambda: f64,
    pub adapt_lambda: bool,
    pub adapt_lr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleFactors {
    /// True while only the task loss is optimised.
    pub warm_up: bool,
    pub grow: f64,
    pub lambda: f64,
    pub lr_factor: f64,
}

impl AdaptSchedule {
    pub fn factors(&self, epoch: usize, batch: usize) -> ScheduleFactors {
        let warm_up = epoch < self.init_epochs;
        let (grow, lr_factor) = if warm_up {
            (0.0, 1.0)
        } else {
            let nb = self.batches_per_epoch.max(1) as f64;
            let span = (self.adapt_epochs.max(1) as f64) * nb;
            let p = (batch as f64 + (epoch - self.init_epochs) as f64 * nb) / span;
            let grow = 2.0 / (1.0 + (-10.0 * p).exp()) - 1.0;
            let lr_factor = if self.adapt_lr {
                (1.0 + 10.0 * p).powf(-0.75)
            } else {
                1.0
            };
            (grow, lr_factor)
        };
        let lambda = if self.adapt_lambda {
            self.init_lambda * grow
        } else {
            self.init_lambda
        };
        ScheduleFactors {
            warm_up,
            grow,
            lambda,
            lr_factor,
        }
    }
}
