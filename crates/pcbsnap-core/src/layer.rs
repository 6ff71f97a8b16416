//! 图层与图层集合
//!
//! 板上最多 64 个图层，图层集合用 u64 位域表示。

use serde::{Deserialize, Serialize};

/// 图层编号（0..64）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u8);

impl LayerId {
    pub const F_CU: LayerId = LayerId(0);
    pub const B_CU: LayerId = LayerId(31);
    pub const F_SILKS: LayerId = LayerId(37);
    pub const B_SILKS: LayerId = LayerId(36);
    pub const F_MASK: LayerId = LayerId(39);
    pub const B_MASK: LayerId = LayerId(38);
    pub const EDGE_CUTS: LayerId = LayerId(44);
    pub const F_FAB: LayerId = LayerId(49);
    pub const B_FAB: LayerId = LayerId(48);
    pub const USER_DRAWINGS: LayerId = LayerId(40);

    /// 内层铜箔 In1..In30
    pub fn inner_copper(index: u8) -> Option<LayerId> {
        (1..=30).contains(&index).then_some(LayerId(index))
    }

    pub fn is_copper(&self) -> bool {
        self.0 <= 31
    }
}

/// 图层集合（位域）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LayerSet {
    bits: u64,
}

impl LayerSet {
    pub const NONE: LayerSet = LayerSet { bits: 0 };
    pub const ALL: LayerSet = LayerSet { bits: u64::MAX };

    pub fn new(bits: u64) -> Self {
        Self { bits }
    }

    pub fn single(layer: LayerId) -> Self {
        Self {
            bits: 1u64 << (layer.0 & 63),
        }
    }

    pub fn from_layers(layers: impl IntoIterator<Item = LayerId>) -> Self {
        let mut set = Self::NONE;
        for layer in layers {
            set.insert(layer);
        }
        set
    }

    /// 所有铜层
    pub fn all_copper() -> Self {
        Self {
            bits: (1u64 << 32) - 1,
        }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn insert(&mut self, layer: LayerId) {
        self.bits |= 1u64 << (layer.0 & 63);
    }

    pub fn remove(&mut self, layer: LayerId) {
        self.bits &= !(1u64 << (layer.0 & 63));
    }

    pub fn contains(&self, layer: LayerId) -> bool {
        self.bits & (1u64 << (layer.0 & 63)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn intersects(&self, other: &LayerSet) -> bool {
        self.bits & other.bits != 0
    }

    pub fn union(&self, other: &LayerSet) -> LayerSet {
        LayerSet {
            bits: self.bits | other.bits,
        }
    }

    pub fn intersection(&self, other: &LayerSet) -> LayerSet {
        LayerSet {
            bits: self.bits & other.bits,
        }
    }

    /// 按编号升序迭代集合中的图层
    pub fn iter(&self) -> impl Iterator<Item = LayerId> + '_ {
        (0u8..64).filter(move |i| self.bits & (1u64 << i) != 0).map(LayerId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_set() {
        let mut set = LayerSet::single(LayerId::F_CU);
        set.insert(LayerId::B_CU);
        assert!(set.contains(LayerId::F_CU));
        assert!(set.contains(LayerId::B_CU));
        assert!(!set.contains(LayerId::EDGE_CUTS));
        assert!(set.intersects(&LayerSet::all_copper()));
        assert!(!set.intersects(&LayerSet::single(LayerId::F_SILKS)));

        set.remove(LayerId::F_CU);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![LayerId::B_CU]);
        assert_eq!(LayerId::inner_copper(31), None);
    }
}
