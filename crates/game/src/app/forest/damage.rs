use relic_engine::DamageModel;

/// Turns enemy contacts into health loss. One policy per level session.
pub(crate) trait DamagePolicy {
    fn name(&self) -> &'static str;
    /// Runs once per frame before any contact is reported.
    fn begin_frame(&mut self, dt_seconds: f32);
    /// Health to subtract for one enemy touching the player this frame.
    fn on_contact(&mut self, dt_seconds: f32) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ContinuousDamage {
    rate_per_second: f32,
}

impl ContinuousDamage {
    pub(crate) fn new(rate_per_second: f32) -> Self {
        Self { rate_per_second }
    }
}

impl DamagePolicy for ContinuousDamage {
    fn name(&self) -> &'static str {
        "continuous"
    }

    fn begin_frame(&mut self, _dt_seconds: f32) {}

    fn on_contact(&mut self, dt_seconds: f32) -> f32 {
        self.rate_per_second * dt_seconds.max(0.0)
    }
}

/// A fixed hit followed by a refractory window shared by every enemy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CooldownDamage {
    amount: f32,
    cooldown_seconds: f32,
    remaining_seconds: f32,
}

impl CooldownDamage {
    pub(crate) fn new(amount: f32, cooldown_seconds: f32) -> Self {
        Self {
            amount,
            cooldown_seconds,
            remaining_seconds: 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn remaining_seconds(&self) -> f32 {
        self.remaining_seconds
    }
}

impl DamagePolicy for CooldownDamage {
    fn name(&self) -> &'static str {
        "cooldown"
    }

    fn begin_frame(&mut self, dt_seconds: f32) {
        self.remaining_seconds = (self.remaining_seconds - dt_seconds.max(0.0)).max(0.0);
    }

    fn on_contact(&mut self, _dt_seconds: f32) -> f32 {
        if self.remaining_seconds > 0.0 {
            return 0.0;
        }
        self.remaining_seconds = self.cooldown_seconds;
        self.amount
    }
}

pub(crate) fn policy_for(model: DamageModel) -> Box<dyn DamagePolicy> {
    match model {
        DamageModel::Continuous { rate_per_second } => {
            Box::new(ContinuousDamage::new(rate_per_second))
        }
        DamageModel::Cooldown {
            amount,
            cooldown_seconds,
        } => Box::new(CooldownDamage::new(amount, cooldown_seconds)),
    }
}
