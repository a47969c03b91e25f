//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::Deserialize;

use crate::link::Link;
use crate::packet::RxContext;

// Pluggable link-quality filter, consulted by the status computation
// and fed once per received HELLO before the database commit.
pub trait LinkHysteresis: std::fmt::Debug + Send {
    fn update(&self, link: &mut Link, ctx: &RxContext);

    fn is_pending(&self, link: &Link) -> bool;

    fn is_lost(&self, link: &Link) -> bool;
}

// Per-link state owned by the hysteresis plugin.
#[derive(Clone, Copy, Debug)]
pub struct HysteresisData {
    pub quality: f64,
    pub pending: bool,
    pub lost: bool,
}

// Default plugin: every heard link is immediately usable.
#[derive(Debug, Default)]
pub struct NoopHysteresis;

// Exponentially weighted link quality estimate (RFC 6130 Appendix B).
//
// A new link stays pending until its quality first reaches the accept
// threshold; afterwards it is considered lost whenever the quality
// drops below the reject threshold.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EwmaHysteresis {
    pub alpha: f64,
    pub accept: f64,
    pub reject: f64,
}

// ===== impl HysteresisData =====

impl Default for HysteresisData {
    fn default() -> HysteresisData {
        HysteresisData {
            quality: 0.0,
            pending: true,
            lost: false,
        }
    }
}

// ===== impl NoopHysteresis =====

impl LinkHysteresis for NoopHysteresis {
    fn update(&self, _link: &mut Link, _ctx: &RxContext) {}

    fn is_pending(&self, _link: &Link) -> bool {
        false
    }

    fn is_lost(&self, _link: &Link) -> bool {
        false
    }
}

// ===== impl EwmaHysteresis =====

impl Default for EwmaHysteresis {
    fn default() -> EwmaHysteresis {
        EwmaHysteresis {
            alpha: 0.25,
            accept: 0.8,
            reject: 0.3,
        }
    }
}

impl LinkHysteresis for EwmaHysteresis {
    fn update(&self, link: &mut Link, _ctx: &RxContext) {
        let data = &mut link.hysteresis;
        data.quality = data.quality * (1.0 - self.alpha) + self.alpha;
        if data.quality >= self.accept {
            data.pending = false;
            data.lost = false;
        } else if data.quality < self.reject {
            data.lost = true;
        }
    }

    fn is_pending(&self, link: &Link) -> bool {
        link.hysteresis.pending
    }

    fn is_lost(&self, link: &Link) -> bool {
        link.hysteresis.lost
    }
}

// ===== unit tests =====
