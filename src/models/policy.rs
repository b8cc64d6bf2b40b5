//! 学習方策モード向けの観測・行動・報酬の定義
//!
//! 学習ループ自体は持たず、外部の方策を [`IPolicy`] として差し込める契約だけを提供します。

use rand::{Rng, RngCore};
use serde::Serialize;
use crate::models::{
    common::{TargetEstimate, Vec2},
    guidance::MissileRole,
    traits::IPolicy,
};

/// 観測ベクトルの次元
pub const OBSERVATION_SIZE: usize = 6;

/// 命中時の報酬
pub const REWARD_HIT: f64 = 100.0;
/// 命中以外で終了したときの報酬
pub const REWARD_TERMINATED: f64 = -50.0;
/// 接近量に掛ける係数
pub const REWARD_PROGRESS_SCALE: f64 = 10.0;
/// 1ティックあたりの時間ペナルティ
pub const REWARD_STEP_PENALTY: f64 = 1.0;

/// 方策への観測
///
/// `[pos_x / width, pos_y / height, dx / width, dy / height, fuel / initial_fuel, role]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation(pub [f64; OBSERVATION_SIZE]);

impl Observation {
    /// ミサイル状態から観測を構築
    ///
    /// 推定が `Unknown` の場合、目標方向成分は0になります。
    ///
    /// # 引数
    ///
    /// * `position` - 自機位置
    /// * `estimate` - 自機の融合推定
    /// * `fuel` / `initial_fuel` - 残燃料と初期燃料
    /// * `role` - 役割
    /// * `width` / `height` - グリッド寸法
    pub fn build(
        position: Vec2,
        estimate: TargetEstimate,
        fuel: u32,
        initial_fuel: u32,
        role: MissileRole,
        width: f64,
        height: f64,
    ) -> Self {
        let width = width.max(1.0);
        let height = height.max(1.0);
        let delta = estimate.position().map(|p| p - position).unwrap_or(Vec2::zero());
        let fuel_ratio = if initial_fuel == 0 {
            0.0
        } else {
            f64::from(fuel) / f64::from(initial_fuel)
        };

        Observation([
            position.x / width,
            position.y / height,
            delta.x / width,
            delta.y / height,
            fuel_ratio,
            role.value(),
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// 方策が選ぶ離散行動
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PolicyAction {
    Forward,
    TurnLeft,
    TurnRight,
    SlowDown,
    SpeedUp,
}

impl PolicyAction {
    pub const ALL: [PolicyAction; 5] = [
        PolicyAction::Forward,
        PolicyAction::TurnLeft,
        PolicyAction::TurnRight,
        PolicyAction::SlowDown,
        PolicyAction::SpeedUp,
    ];

    pub fn index(&self) -> usize {
        match self {
            PolicyAction::Forward => 0,
            PolicyAction::TurnLeft => 1,
            PolicyAction::TurnRight => 2,
            PolicyAction::SlowDown => 3,
            PolicyAction::SpeedUp => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// 1ティック分の報酬
///
/// # 引数
///
/// * `previous_distance` / `current_distance` - 行動前後の推定目標までの距離
/// * `hit` - 今ティックに命中したか
/// * `terminated` - 今ティックに（命中以外で）終了したか
pub fn reward(previous_distance: f64, current_distance: f64, hit: bool, terminated: bool) -> f64 {
    if hit {
        REWARD_HIT
    } else if terminated {
        REWARD_TERMINATED
    } else {
        REWARD_PROGRESS_SCALE * (previous_distance - current_distance) - REWARD_STEP_PENALTY
    }
}

/// 一様ランダムに行動を選ぶ方策
#[derive(Debug, Default)]
pub struct RandomPolicy {
    decisions: u64,
}

impl RandomPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> u64 {
        self.decisions
    }
}

impl IPolicy for RandomPolicy {
    fn select_action(&mut self, _observation: &Observation, rng: &mut dyn RngCore) -> PolicyAction {
        self.decisions += 1;
        let index = rng.gen_range(0..PolicyAction::ALL.len());
        PolicyAction::ALL[index]
    }
}
