//! # Guidance モジュール
//!
//! スウォームモードごとの誘導戦略を提供します。
//!
//! 各戦略は「自機状態 + 今ティックの受信メッセージ +（許可された場合のみ）真の目標位置」
//! から進行方向と速度要求を決める純粋関数で、[`IGuidance`] を実装します。
//! 状態（推定値・偵察ステート）の更新内容は [`GuidanceCommand`] として返し、
//! 適用はミサイル側で行います。
//!
//! ## 共通の数値ポリシー
//!
//! 目標点までの距離がεを下回る場合はゼロベクトルを出さず、直前の進行方向に
//! 小さな乱数摂動を加えて正規化します。それでもゼロになる場合は既定方向
//! （+X軸）を使用します。距離計算はすべてユークリッドノルムです。

use std::fmt;
use std::str::FromStr;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;
use crate::models::{
    traits::{IGuidance, ISensor},
    common::{AgentId, TargetEstimate, Vec2},
    comms::Message,
    policy::PolicyAction,
    sensor::Sensor,
};
use crate::scenario::GuidanceConfig;

/// スウォームの戦術モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwarmMode {
    /// 各機が独立して推定位置へ向かう
    #[default]
    #[serde(alias = "SIMPLE")]
    Independent,
    /// 飽和攻撃（到達タイミングを同期）
    #[serde(alias = "OVERWHELM")]
    Saturation,
    /// 波状攻撃（ウェーブごとに閾値をずらす）
    #[serde(alias = "WAVE")]
    PulseWave,
    /// 偵察主導（スカウトとアタッカー）
    #[serde(alias = "RECCE")]
    ReconLed,
    /// 多方向同時接近
    #[serde(alias = "SPLIT_AXIS")]
    MultiAxis,
    /// デコイ（命中しない陽動）
    Decoy,
    /// 学習方策による行動選択
    #[serde(alias = "RL")]
    Learned,
}

impl SwarmMode {
    pub const ALL: [SwarmMode; 7] = [
        SwarmMode::Independent,
        SwarmMode::Saturation,
        SwarmMode::PulseWave,
        SwarmMode::ReconLed,
        SwarmMode::MultiAxis,
        SwarmMode::Decoy,
        SwarmMode::Learned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SwarmMode::Independent => "INDEPENDENT",
            SwarmMode::Saturation => "SATURATION",
            SwarmMode::PulseWave => "PULSE_WAVE",
            SwarmMode::ReconLed => "RECON_LED",
            SwarmMode::MultiAxis => "MULTI_AXIS",
            SwarmMode::Decoy => "DECOY",
            SwarmMode::Learned => "LEARNED",
        }
    }
}

impl fmt::Display for SwarmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwarmMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "INDEPENDENT" | "SIMPLE" => Ok(SwarmMode::Independent),
            "SATURATION" | "OVERWHELM" => Ok(SwarmMode::Saturation),
            "PULSE_WAVE" | "WAVE" => Ok(SwarmMode::PulseWave),
            "RECON_LED" | "RECCE" => Ok(SwarmMode::ReconLed),
            "MULTI_AXIS" | "SPLIT_AXIS" => Ok(SwarmMode::MultiAxis),
            "DECOY" => Ok(SwarmMode::Decoy),
            "LEARNED" | "RL" => Ok(SwarmMode::Learned),
            _ => Err(format!(
                "無効なスウォームモード: {}. 利用可能: independent, saturation, pulse_wave, recon_led, multi_axis, decoy, learned",
                s
            )),
        }
    }
}

/// ミサイルの役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissileRole {
    Attacker,
    Scout,
}

impl MissileRole {
    /// 観測ベクトル用の数値表現
    pub fn value(&self) -> f64 {
        match self {
            MissileRole::Attacker => 1.0,
            MissileRole::Scout => 2.0,
        }
    }
}

/// 偵察主導モードにおけるアタッカーの状態
///
/// `InitialLoiter` から `ConfirmedAttack` への遷移は不可逆です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReconState {
    /// 最低速度で待機
    InitialLoiter,
    /// スカウトの推定を受けて攻撃中
    ConfirmedAttack,
}

/// 接近軸（多方向接近モード、`id mod 4` で決定）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproachAxis {
    East,
    West,
    North,
    South,
}

impl ApproachAxis {
    pub fn from_id(id: AgentId) -> Self {
        match id % 4 {
            0 => ApproachAxis::East,
            1 => ApproachAxis::West,
            2 => ApproachAxis::North,
            _ => ApproachAxis::South,
        }
    }

    /// 目標からのオフセット方向
    pub fn offset(&self) -> Vec2 {
        match self {
            ApproachAxis::East => Vec2::new(1.0, 0.0),
            ApproachAxis::West => Vec2::new(-1.0, 0.0),
            ApproachAxis::North => Vec2::new(0.0, -1.0),
            ApproachAxis::South => Vec2::new(0.0, 1.0),
        }
    }
}

/// 誘導戦略への入力（自機状態のスナップショット）
#[derive(Debug, Clone, Copy)]
pub struct GuidanceInput<'a> {
    pub id: AgentId,
    pub position: Vec2,
    pub direction: Vec2,
    pub current_speed: f64,
    pub base_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub role: MissileRole,
    pub recon_state: Option<ReconState>,
    pub wave_id: u32,
    pub estimate: TargetEstimate,
    pub sensor: &'a Sensor,
    /// 今ティックに受信したメッセージのみ
    pub inbox: &'a [Message],
    /// 真の目標位置（目標が存在しない場合は `None`）
    pub true_target: Option<Vec2>,
    pub config: &'a GuidanceConfig,
}

/// 誘導戦略の出力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceCommand {
    /// 新しい進行方向（単位ベクトル）
    pub direction: Vec2,
    /// 速度要求（クランプ前）
    pub speed: f64,
    /// 更新後の融合推定
    pub estimate: TargetEstimate,
    /// 更新後の偵察ステート
    pub recon_state: Option<ReconState>,
    /// 自爆要求（デコイ）
    pub self_destruct: bool,
}

impl GuidanceCommand {
    fn new(input: &GuidanceInput<'_>, direction: Vec2, speed: f64, estimate: TargetEstimate) -> Self {
        Self {
            direction,
            speed,
            estimate,
            recon_state: input.recon_state,
            self_destruct: false,
        }
    }
}

/// 進行方向が退化した場合の補正
///
/// 直前の方向に一様乱数の摂動を加えて正規化し、それもゼロなら既定方向を返します。
pub fn perturb_direction<R: Rng + ?Sized>(previous: Vec2, config: &GuidanceConfig, rng: &mut R) -> Vec2 {
    let p = config.perturbation;
    let jitter = if p > 0.0 {
        Vec2::new(rng.gen_range(-p..=p), rng.gen_range(-p..=p))
    } else {
        Vec2::zero()
    };
    (previous + jitter)
        .normalized(config.epsilon)
        .unwrap_or(Vec2::default_heading())
}

/// 目標点へ向かう単位方向ベクトル
///
/// 目標点が無い（推定不明）場合は現在の進行方向を維持します。
pub fn steer_towards<R: Rng + ?Sized>(
    position: Vec2,
    aim: Option<Vec2>,
    previous: Vec2,
    config: &GuidanceConfig,
    rng: &mut R,
) -> Vec2 {
    match aim {
        Some(point) => match (point - position).normalized(config.epsilon) {
            Some(direction) => direction,
            None => perturb_direction(previous, config, rng),
        },
        None => previous
            .normalized(config.epsilon)
            .unwrap_or_else(|| perturb_direction(previous, config, rng)),
    }
}

/// 自機推定と他機推定の算術平均による融合
pub fn fuse_estimates<'a, I>(own: TargetEstimate, peers: I) -> TargetEstimate
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut estimates: Vec<Vec2> = own.position().into_iter().collect();
    estimates.extend(peers.into_iter().filter_map(|m| m.target_estimate.position()));
    Vec2::mean(estimates.iter()).into()
}

/// 自機と他機（メッセージ送信元）の真の目標までの平均距離
fn swarm_average_distance<'a, I>(own_distance: f64, target: Vec2, peers: I) -> f64
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut total = own_distance;
    let mut count = 1usize;
    for message in peers {
        total += message.position.distance(&target);
        count += 1;
    }
    total / count as f64
}

/// 自機センサーで目標を探知できれば絶対位置推定を返す
fn own_sensor_fix<R: Rng + ?Sized>(input: &GuidanceInput<'_>, rng: &mut R) -> Option<Vec2> {
    let target = input.true_target?;
    input
        .sensor
        .detect(input.position, input.direction, target, rng)
        .map(|offset| input.position + offset)
}

/// 3段階の速度規則（飽和攻撃・波状攻撃で共通）
///
/// 最終突入距離以内なら巡航速度、群平均よりバッファ以上先行していれば減速、
/// それ以外は巡航速度。
fn tiered_speed(
    input: &GuidanceInput<'_>,
    own_distance: f64,
    average_distance: f64,
    final_assault_distance: f64,
) -> f64 {
    let config = input.config;
    if own_distance <= final_assault_distance {
        input.base_speed
    } else if own_distance < average_distance - config.loiter_buffer {
        input.base_speed * config.loiter_speed_factor
    } else {
        input.base_speed
    }
}

/// 独立誘導（INDEPENDENT）
#[derive(Debug, Clone, Copy, Default)]
pub struct IndependentGuidance;

impl IGuidance for IndependentGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let mut estimate = input.estimate;

        // 切替距離以内では自機センサーがTRU由来の推定を上書き
        if let Some(target) = input.true_target {
            if input.position.distance(&target) <= input.config.sensor_switch_distance {
                if let Some(fix) = own_sensor_fix(input, rng) {
                    estimate = TargetEstimate::Known(fix);
                }
            }
        }

        let direction = steer_towards(input.position, estimate.position(), input.direction, input.config, rng);
        GuidanceCommand::new(input, direction, input.base_speed, estimate)
    }
}

/// 飽和攻撃（SATURATION）
#[derive(Debug, Clone, Copy, Default)]
pub struct SaturationGuidance;

impl IGuidance for SaturationGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let estimate = fuse_estimates(input.estimate, input.inbox);

        let speed = match input.true_target {
            Some(target) => {
                let own_distance = input.position.distance(&target);
                let average = swarm_average_distance(own_distance, target, input.inbox);
                tiered_speed(input, own_distance, average, input.config.final_assault_distance)
            }
            None => input.base_speed,
        };

        let direction = steer_towards(input.position, estimate.position(), input.direction, input.config, rng);
        GuidanceCommand::new(input, direction, speed, estimate)
    }
}

/// 波状攻撃（PULSE_WAVE）
///
/// 推定融合は全受信メッセージ、群平均距離は同一ウェーブの送信元のみで計算します。
#[derive(Debug, Clone, Copy, Default)]
pub struct PulseWaveGuidance;

impl PulseWaveGuidance {
    /// ウェーブごとの最終突入距離
    pub fn final_assault_distance(wave_id: u32, config: &GuidanceConfig) -> f64 {
        config.final_assault_distance + f64::from(wave_id) * config.wave_stagger_increment
    }
}

impl IGuidance for PulseWaveGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let estimate = fuse_estimates(input.estimate, input.inbox);

        let speed = match input.true_target {
            Some(target) => {
                let own_distance = input.position.distance(&target);
                let same_wave = input.inbox.iter().filter(|m| m.wave_id == input.wave_id);
                let average = swarm_average_distance(own_distance, target, same_wave);
                let threshold = Self::final_assault_distance(input.wave_id, input.config);
                tiered_speed(input, own_distance, average, threshold)
            }
            None => input.base_speed,
        };

        let direction = steer_towards(input.position, estimate.position(), input.direction, input.config, rng);
        GuidanceCommand::new(input, direction, speed, estimate)
    }
}

/// 偵察主導（RECON_LED）
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconGuidance;

impl ReconGuidance {
    /// 今ティックに受信したスカウト由来の推定
    pub fn fresh_scout_estimates(inbox: &[Message]) -> Vec<Vec2> {
        inbox
            .iter()
            .filter(|m| m.role == MissileRole::Scout)
            .filter_map(|m| m.target_estimate.position())
            .collect()
    }

    /// スカウトの誘導
    ///
    /// 基準速度で融合推定へ向かい、横方向の乱数オフセットを加えます。
    /// 他機の推定は取り込みません。自機センサーで探知できたティックは
    /// その探知で推定を更新します（TRU配信に加えた拡張で、探知がなければ推定は維持）。
    fn scout<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let estimate = match own_sensor_fix(input, rng) {
            Some(fix) => TargetEstimate::Known(fix),
            None => input.estimate,
        };

        let base = steer_towards(input.position, estimate.position(), input.direction, input.config, rng);

        // 進行方向に垂直な横方向の乱数オフセットで探索範囲を広げる
        let spread = input.config.scout_lateral_spread;
        let lateral = if spread > 0.0 { rng.gen_range(-spread..=spread) } else { 0.0 };
        let direction = (base + base.perpendicular() * lateral)
            .normalized(input.config.epsilon)
            .unwrap_or(base);

        GuidanceCommand {
            recon_state: None,
            ..GuidanceCommand::new(input, direction, input.base_speed, estimate)
        }
    }

    fn attacker<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let fresh = Self::fresh_scout_estimates(input.inbox);
        let mut estimate = match Vec2::mean(fresh.iter()) {
            Some(fused) => TargetEstimate::Known(fused),
            None => input.estimate,
        };

        let state = input.recon_state.unwrap_or(ReconState::InitialLoiter);
        let (next_state, speed) = match state {
            ReconState::InitialLoiter if !fresh.is_empty() => {
                trace!(missile_id = input.id, scout_reports = fresh.len(), "RECON_CONFIRMED: スカウト推定を受信しました");
                (ReconState::ConfirmedAttack, input.base_speed)
            }
            ReconState::InitialLoiter => (ReconState::InitialLoiter, input.min_speed),
            ReconState::ConfirmedAttack => {
                // 終末誘導では自機センサーが最優先
                if let Some(fix) = own_sensor_fix(input, rng) {
                    estimate = TargetEstimate::Known(fix);
                }
                (ReconState::ConfirmedAttack, input.base_speed)
            }
        };

        let direction = steer_towards(input.position, estimate.position(), input.direction, input.config, rng);
        GuidanceCommand {
            recon_state: Some(next_state),
            ..GuidanceCommand::new(input, direction, speed, estimate)
        }
    }
}

impl IGuidance for ReconGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        match input.role {
            MissileRole::Scout => self.scout(input, rng),
            MissileRole::Attacker => self.attacker(input, rng),
        }
    }
}

/// 多方向接近（MULTI_AXIS）
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiAxisGuidance;

impl MultiAxisGuidance {
    /// 接近フェーズの照準点
    pub fn aim_point(id: AgentId, target: Vec2, config: &GuidanceConfig) -> Vec2 {
        target + ApproachAxis::from_id(id).offset() * config.approach_offset
    }
}

impl IGuidance for MultiAxisGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let config = input.config;
        let estimate = fuse_estimates(input.estimate, input.inbox);

        let Some(target) = input.true_target else {
            let direction = steer_towards(input.position, estimate.position(), input.direction, config, rng);
            return GuidanceCommand::new(input, direction, input.base_speed, estimate);
        };

        let own_distance = input.position.distance(&target);

        // 終末フェーズ: 真の目標へ直接追尾
        if own_distance < config.terminal_distance {
            let direction = steer_towards(input.position, Some(target), input.direction, config, rng);
            return GuidanceCommand::new(input, direction, input.base_speed, estimate);
        }

        let aim = Self::aim_point(input.id, target, config);
        let direction = steer_towards(input.position, Some(aim), input.direction, config, rng);

        // 群の結束: 先行しすぎなら最低速度、遅れすぎなら最高速度
        let average = swarm_average_distance(own_distance, target, input.inbox);
        let speed = if own_distance < average - config.cohesion_buffer {
            input.min_speed
        } else if own_distance > average + config.cohesion_buffer {
            input.max_speed
        } else {
            input.base_speed
        };

        GuidanceCommand::new(input, direction, speed, estimate)
    }
}

/// デコイ（DECOY）
///
/// 自機の推定のみを使用し、他機の推定は取り込みません。目標に近づくと
/// ランダムにずらした点へ針路を変え、それでも自爆距離に入った場合は自爆します。
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoyGuidance;

impl DecoyGuidance {
    fn divert_point<R: Rng + ?Sized>(anchor: Vec2, config: &GuidanceConfig, rng: &mut R) -> Vec2 {
        let sign = |rng: &mut R| if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let [x_min, x_max] = config.decoy_divert_x;
        let [y_min, y_max] = config.decoy_divert_y;
        let dy = rng.gen_range(y_min..=y_max) * sign(rng);
        let dx = rng.gen_range(x_min..=x_max) * sign(rng);
        Vec2::new(anchor.x + dx, anchor.y + dy)
    }
}

impl IGuidance for DecoyGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let config = input.config;
        let estimate = input.estimate;

        if let Some(target) = input.true_target {
            let distance = input.position.distance(&target);

            if distance <= config.decoy_self_destruct_distance {
                let direction = steer_towards(input.position, None, input.direction, config, rng);
                return GuidanceCommand {
                    self_destruct: true,
                    ..GuidanceCommand::new(input, direction, input.base_speed, estimate)
                };
            }

            if distance <= config.decoy_diverge_distance {
                let aim = estimate
                    .position()
                    .map(|anchor| Self::divert_point(anchor, config, rng));
                let direction = steer_towards(input.position, aim, input.direction, config, rng);
                return GuidanceCommand::new(input, direction, input.base_speed, estimate);
            }
        }

        let direction = steer_towards(input.position, estimate.position(), input.direction, config, rng);
        GuidanceCommand::new(input, direction, input.base_speed, estimate)
    }
}

/// 学習方策（LEARNED）
///
/// 方策が選択した離散行動を進行方向と速度に適用します。
#[derive(Debug, Clone, Copy)]
pub struct LearnedGuidance {
    pub action: PolicyAction,
}

impl IGuidance for LearnedGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand {
        let config = input.config;
        let heading = steer_towards(input.position, None, input.direction, config, rng);
        let (direction, speed) = match self.action {
            PolicyAction::Forward => (heading, input.current_speed),
            PolicyAction::TurnLeft => (heading.rotated(-config.policy_turn_rad), input.current_speed),
            PolicyAction::TurnRight => (heading.rotated(config.policy_turn_rad), input.current_speed),
            PolicyAction::SlowDown => (heading, input.current_speed - config.policy_speed_step),
            PolicyAction::SpeedUp => (heading, input.current_speed + config.policy_speed_step),
        };
        GuidanceCommand::new(input, direction, speed, input.estimate)
    }
}

/// モードに応じた誘導戦略のディスパッチ
///
/// # 引数
///
/// * `mode` - スウォームモード
/// * `input` - 自機状態
/// * `policy_action` - 学習方策モードで選択済みの行動（他モードでは無視）
/// * `rng` - 乱数源
pub fn dispatch<R: Rng + ?Sized>(
    mode: SwarmMode,
    input: &GuidanceInput<'_>,
    policy_action: Option<PolicyAction>,
    rng: &mut R,
) -> GuidanceCommand {
    match mode {
        SwarmMode::Independent => IndependentGuidance.decide(input, rng),
        SwarmMode::Saturation => SaturationGuidance.decide(input, rng),
        SwarmMode::PulseWave => PulseWaveGuidance.decide(input, rng),
        SwarmMode::ReconLed => ReconGuidance.decide(input, rng),
        SwarmMode::MultiAxis => MultiAxisGuidance.decide(input, rng),
        SwarmMode::Decoy => DecoyGuidance.decide(input, rng),
        SwarmMode::Learned => LearnedGuidance {
            action: policy_action.unwrap_or(PolicyAction::Forward),
        }
        .decide(input, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::common::UNIT_EPSILON;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Fixture {
        sensor: Sensor,
        config: GuidanceConfig,
        inbox: Vec<Message>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                sensor: Sensor::new(30.0, 90.0, 0.0),
                config: GuidanceConfig::default(),
                inbox: Vec::new(),
            }
        }

        fn input(&self, position: Vec2, estimate: TargetEstimate, target: Option<Vec2>) -> GuidanceInput<'_> {
            GuidanceInput {
                id: 0,
                position,
                direction: Vec2::new(1.0, 0.0),
                current_speed: 1.0,
                base_speed: 1.0,
                min_speed: 0.1,
                max_speed: 2.0,
                role: MissileRole::Attacker,
                recon_state: None,
                wave_id: 0,
                estimate,
                sensor: &self.sensor,
                inbox: &self.inbox,
                true_target: target,
                config: &self.config,
            }
        }
    }

    fn message(sender_id: AgentId, position: Vec2, estimate: TargetEstimate, role: MissileRole, wave_id: u32) -> Message {
        Message {
            sender_id,
            position,
            target_estimate: estimate,
            speed: 1.0,
            fuel: 100,
            wave_id,
            role,
        }
    }

    #[test]
    fn test_degenerate_aim_is_perturbed_to_unit_vector() {
        let fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let here = Vec2::new(5.0, 5.0);

        for mode in SwarmMode::ALL {
            let input = fixture.input(here, TargetEstimate::Known(here), None);
            let command = dispatch(mode, &input, None, &mut rng);
            assert!(command.direction.is_unit(UNIT_EPSILON), "{mode}: {:?}", command.direction);
        }
    }

    #[test]
    fn test_zero_previous_heading_falls_back_to_default() {
        let mut config = GuidanceConfig::default();
        config.perturbation = 0.0;
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let direction = perturb_direction(Vec2::zero(), &config, &mut rng);
        assert_eq!(direction, Vec2::default_heading());
    }

    #[test]
    fn test_unknown_estimate_holds_heading() {
        let fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let input = fixture.input(Vec2::new(0.0, 0.0), TargetEstimate::Unknown, None);

        let command = IndependentGuidance.decide(&input, &mut rng);
        assert_eq!(command.direction, Vec2::new(1.0, 0.0));
        assert_eq!(command.estimate, TargetEstimate::Unknown);
    }

    #[test]
    fn test_independent_switches_to_own_sensor_near_target() {
        let fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let stale = TargetEstimate::Known(Vec2::new(50.0, 10.0));
        let target = Vec2::new(15.0, 0.0);

        let far = fixture.input(Vec2::new(-10.0, 0.0), stale, Some(target));
        assert_eq!(IndependentGuidance.decide(&far, &mut rng).estimate, stale);

        let near = fixture.input(Vec2::new(0.0, 0.0), stale, Some(target));
        let command = IndependentGuidance.decide(&near, &mut rng);
        assert_eq!(command.estimate, TargetEstimate::Known(target));
        assert_eq!(command.direction, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_saturation_fuses_and_loiters_when_ahead() {
        let mut fixture = Fixture::new();
        fixture.inbox = vec![
            message(1, Vec2::new(0.0, 0.0), TargetEstimate::Known(Vec2::new(100.0, 10.0)), MissileRole::Attacker, 0),
            message(2, Vec2::new(0.0, 0.0), TargetEstimate::Unknown, MissileRole::Attacker, 0),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let target = Vec2::new(100.0, 0.0);

        // 自機は目標まで50、群平均は (50 + 100 + 100) / 3 ≈ 83.3
        let input = fixture.input(Vec2::new(50.0, 0.0), TargetEstimate::Known(Vec2::new(100.0, 0.0)), Some(target));
        let command = SaturationGuidance.decide(&input, &mut rng);

        assert_eq!(command.estimate, TargetEstimate::Known(Vec2::new(100.0, 5.0)));
        assert!((command.speed - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_saturation_final_assault_overrides_loiter() {
        let mut fixture = Fixture::new();
        fixture.inbox = vec![message(1, Vec2::new(0.0, 0.0), TargetEstimate::Unknown, MissileRole::Attacker, 0)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let target = Vec2::new(100.0, 0.0);

        let input = fixture.input(Vec2::new(92.0, 0.0), TargetEstimate::Known(target), Some(target));
        assert_eq!(SaturationGuidance.decide(&input, &mut rng).speed, 1.0);
    }

    #[test]
    fn test_pulse_wave_thresholds_are_staggered() {
        let mut fixture = Fixture::new();
        fixture.inbox = vec![
            message(1, Vec2::new(0.0, 0.0), TargetEstimate::Unknown, MissileRole::Attacker, 0),
            message(2, Vec2::new(0.0, 0.0), TargetEstimate::Unknown, MissileRole::Attacker, 2),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let target = Vec2::new(100.0, 0.0);
        let position = Vec2::new(65.0, 0.0);

        // ウェーブ0: 最終突入距離10、同一ウェーブ平均 (35 + 100) / 2 より先行 → 減速
        let wave0 = fixture.input(position, TargetEstimate::Known(target), Some(target));
        assert!((PulseWaveGuidance.decide(&wave0, &mut rng).speed - 0.2).abs() < 1e-12);

        // ウェーブ2: 最終突入距離 10 + 2 × 15 = 40 → 巡航速度
        let mut wave2 = wave0;
        wave2.wave_id = 2;
        assert_eq!(PulseWaveGuidance::final_assault_distance(2, &fixture.config), 40.0);
        assert_eq!(PulseWaveGuidance.decide(&wave2, &mut rng).speed, 1.0);
    }

    #[test]
    fn test_recon_attacker_confirms_only_on_scout_estimate() {
        let mut fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let estimate = TargetEstimate::Known(Vec2::new(100.0, 0.0));

        // アタッカーからの推定やスカウトの不明推定では遷移しない
        fixture.inbox = vec![
            message(1, Vec2::new(0.0, 0.0), estimate, MissileRole::Attacker, 0),
            message(2, Vec2::new(0.0, 0.0), TargetEstimate::Unknown, MissileRole::Scout, 0),
        ];
        let mut input = fixture.input(Vec2::new(0.0, 0.0), estimate, None);
        input.recon_state = Some(ReconState::InitialLoiter);
        let command = ReconGuidance.decide(&input, &mut rng);
        assert_eq!(command.recon_state, Some(ReconState::InitialLoiter));
        assert_eq!(command.speed, 0.1);

        fixture.inbox = vec![message(2, Vec2::new(0.0, 0.0), TargetEstimate::Known(Vec2::new(80.0, 20.0)), MissileRole::Scout, 0)];
        let mut input = fixture.input(Vec2::new(0.0, 0.0), estimate, None);
        input.recon_state = Some(ReconState::InitialLoiter);
        let command = ReconGuidance.decide(&input, &mut rng);
        assert_eq!(command.recon_state, Some(ReconState::ConfirmedAttack));
        assert_eq!(command.estimate, TargetEstimate::Known(Vec2::new(80.0, 20.0)));
        assert_eq!(command.speed, 1.0);

        // 確認後はメッセージが無くても戻らない
        fixture.inbox.clear();
        let mut input = fixture.input(Vec2::new(0.0, 0.0), command.estimate, None);
        input.recon_state = command.recon_state;
        let command = ReconGuidance.decide(&input, &mut rng);
        assert_eq!(command.recon_state, Some(ReconState::ConfirmedAttack));
        assert_eq!(command.estimate, TargetEstimate::Known(Vec2::new(80.0, 20.0)));
    }

    #[test]
    fn test_recon_confirmed_attacker_prefers_own_sensor() {
        let fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let target = Vec2::new(20.0, 0.0);

        let mut input = fixture.input(Vec2::new(0.0, 0.0), TargetEstimate::Known(Vec2::new(20.0, 9.0)), Some(target));
        input.recon_state = Some(ReconState::ConfirmedAttack);
        let command = ReconGuidance.decide(&input, &mut rng);
        assert_eq!(command.estimate, TargetEstimate::Known(target));
    }

    #[test]
    fn test_recon_scout_ignores_peer_estimates() {
        let mut fixture = Fixture::new();
        fixture.inbox = vec![message(2, Vec2::new(0.0, 0.0), TargetEstimate::Known(Vec2::new(0.0, 90.0)), MissileRole::Scout, 0)];
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let own = TargetEstimate::Known(Vec2::new(100.0, 0.0));

        let mut input = fixture.input(Vec2::new(0.0, 0.0), own, None);
        input.role = MissileRole::Scout;
        for _ in 0..50 {
            let command = ReconGuidance.decide(&input, &mut rng);
            assert_eq!(command.estimate, own);
            assert_eq!(command.recon_state, None);
            assert!(command.direction.is_unit(UNIT_EPSILON));
            // 横方向オフセットは ±0.3 以内 → 前進成分は常に正
            assert!(command.direction.x > 0.9);
        }
    }

    #[test]
    fn test_multi_axis_aims_at_assigned_axis() {
        let config = GuidanceConfig::default();
        let target = Vec2::new(100.0, 30.0);
        let offset = config.approach_offset;

        assert_eq!(MultiAxisGuidance::aim_point(0, target, &config), Vec2::new(100.0 + offset, 30.0));
        assert_eq!(MultiAxisGuidance::aim_point(1, target, &config), Vec2::new(100.0 - offset, 30.0));
        assert_eq!(MultiAxisGuidance::aim_point(2, target, &config), Vec2::new(100.0, 30.0 - offset));
        assert_eq!(MultiAxisGuidance::aim_point(7, target, &config), Vec2::new(100.0, 30.0 + offset));
    }

    #[test]
    fn test_multi_axis_terminal_pursuit_and_cohesion() {
        let mut fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let target = Vec2::new(100.0, 0.0);

        let near = fixture.input(Vec2::new(70.0, 0.0), TargetEstimate::Unknown, Some(target));
        let command = MultiAxisGuidance.decide(&near, &mut rng);
        assert_eq!(command.direction, Vec2::new(1.0, 0.0));
        assert_eq!(command.speed, 1.0);

        // 群から遅れている → 最高速度
        fixture.inbox = vec![message(1, Vec2::new(40.0, 0.0), TargetEstimate::Unknown, MissileRole::Attacker, 0)];
        let behind = fixture.input(Vec2::new(0.0, 0.0), TargetEstimate::Unknown, Some(target));
        assert_eq!(MultiAxisGuidance.decide(&behind, &mut rng).speed, 2.0);

        // 群より先行している → 最低速度
        fixture.inbox = vec![message(1, Vec2::new(-40.0, 0.0), TargetEstimate::Unknown, MissileRole::Attacker, 0)];
        let ahead = fixture.input(Vec2::new(0.0, 0.0), TargetEstimate::Unknown, Some(target));
        assert_eq!(MultiAxisGuidance.decide(&ahead, &mut rng).speed, 0.1);
    }

    #[test]
    fn test_decoy_ignores_peers_and_self_destructs() {
        let mut fixture = Fixture::new();
        fixture.inbox = vec![message(1, Vec2::new(0.0, 0.0), TargetEstimate::Known(Vec2::new(0.0, 50.0)), MissileRole::Attacker, 0)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let target = Vec2::new(200.0, 0.0);
        let own = TargetEstimate::Known(target);

        let far = fixture.input(Vec2::new(0.0, 0.0), own, Some(target));
        let command = DecoyGuidance.decide(&far, &mut rng);
        assert_eq!(command.estimate, own);
        assert_eq!(command.direction, Vec2::new(1.0, 0.0));
        assert!(!command.self_destruct);

        let adjacent = fixture.input(Vec2::new(199.0, 0.0), own, Some(target));
        assert!(DecoyGuidance.decide(&adjacent, &mut rng).self_destruct);
    }

    #[test]
    fn test_decoy_diverges_away_from_estimate() {
        let fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let target = Vec2::new(100.0, 0.0);

        for _ in 0..50 {
            let input = fixture.input(Vec2::new(40.0, 0.0), TargetEstimate::Known(target), Some(target));
            let command = DecoyGuidance.decide(&input, &mut rng);
            // 縦方向に50以上ずらした点へ向かうため、方向のY成分は0にならない
            assert!(command.direction.y.abs() > 0.3);
            assert!(!command.self_destruct);
        }
    }

    #[test]
    fn test_learned_actions_adjust_heading_and_speed() {
        let fixture = Fixture::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let input = fixture.input(Vec2::new(0.0, 0.0), TargetEstimate::Unknown, None);

        let right = LearnedGuidance { action: PolicyAction::TurnRight }.decide(&input, &mut rng);
        assert!(right.direction.is_unit(UNIT_EPSILON));
        assert!(right.direction.y > 0.0);

        let faster = LearnedGuidance { action: PolicyAction::SpeedUp }.decide(&input, &mut rng);
        assert!((faster.speed - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_swarm_mode_parsing_accepts_legacy_names() {
        assert_eq!("overwhelm".parse::<SwarmMode>(), Ok(SwarmMode::Saturation));
        assert_eq!("pulse-wave".parse::<SwarmMode>(), Ok(SwarmMode::PulseWave));
        assert_eq!("RECON_LED".parse::<SwarmMode>(), Ok(SwarmMode::ReconLed));
        assert!("kamikaze".parse::<SwarmMode>().is_err());
    }
}
