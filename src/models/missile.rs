use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::models::{
    traits::{IAgent, IMovable},
    common::{AgentId, AgentKind, AgentStatus, GridCell, TargetEstimate, Vec2, UNIT_EPSILON},
    comms::{Broadcast, Message},
    grid::Grid,
    guidance::{self, GuidanceCommand, GuidanceInput, MissileRole, ReconState, SwarmMode},
    policy::{self, Observation, PolicyAction},
    sensor::Sensor,
};
use crate::scenario::{GuidanceConfig, SwarmConfig};

/// ミサイル終了理由
///
/// ミサイルがアクティブ状態から終了した理由を表します。終了は一方向で、
/// 一度終了したミサイルが再びアクティブになることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissileEndReason {
    /// 目標セルに進入して命中した
    Hit,
    /// 燃料が尽きた
    FuelExhausted,
    /// デコイが自爆した（命中扱いにしない）
    DecoySelfDestruct,
    /// 誘導が非有限・退化した方向を返した
    GuidanceFailure,
}

impl MissileEndReason {
    /// 終了理由に対応するエージェント状態
    pub fn status(&self) -> AgentStatus {
        match self {
            MissileEndReason::Hit => AgentStatus::Exploded,
            MissileEndReason::FuelExhausted | MissileEndReason::GuidanceFailure => AgentStatus::Depleted,
            MissileEndReason::DecoySelfDestruct => AgentStatus::SelfDestruct,
        }
    }
}

/// 発射時に決まるミサイルの個別パラメータ
#[derive(Debug, Clone, Copy)]
pub struct MissileLaunch {
    pub role: MissileRole,
    pub wave_id: u32,
    pub recon_state: Option<ReconState>,
    pub sensor: Sensor,
    pub position: Vec2,
    pub cell: GridCell,
    pub launch_tick: u64,
}

/// 1ティック分の実行環境
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// 真の目標の位置とセル（目標が存在しない場合は `None`）
    pub target: Option<(Vec2, GridCell)>,
    pub grid: &'a Grid,
    pub guidance: &'a GuidanceConfig,
}

/// スウォームを構成する徘徊型ミサイル
///
/// 毎ティック、誘導 → 速度クランプ → 燃料消費 → 移動 → 衝突判定の順に処理します。
#[derive(Debug, Clone)]
pub struct MissileUnit {
    pub id: AgentId,
    pub mode: SwarmMode,
    pub role: MissileRole,
    pub status: AgentStatus,

    /// 連続座標
    pub position: Vec2,
    /// 現在のセル
    pub cell: GridCell,
    /// 進行方向（単位ベクトル）
    pub direction: Vec2,

    pub base_speed: f64,
    pub current_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,

    /// 残燃料（ティック数）
    pub fuel: u32,
    pub initial_fuel: u32,

    pub recon_state: Option<ReconState>,
    pub wave_id: u32,
    pub estimate: TargetEstimate,
    /// 今ティックの受信箱
    pub inbox: Vec<Message>,
    pub comms_range: f64,
    pub sensor: Sensor,

    pub launch_tick: u64,
    /// 移動したティック数
    pub ticks_flown: u64,
    /// 累積移動距離
    pub distance_travelled: f64,
    /// 学習方策モードの累積報酬
    pub cumulative_reward: f64,
    pub end_reason: Option<MissileEndReason>,
    trail: Vec<GridCell>,
}

impl MissileUnit {
    /// ミサイルを発射
    ///
    /// # 引数
    ///
    /// * `id` - 安定ID
    /// * `mode` - スウォームモード
    /// * `launch` - 役割・ウェーブ・センサー・発射位置
    /// * `swarm` - 速度・燃料・通信距離などの共通設定
    pub fn launch(id: AgentId, mode: SwarmMode, launch: MissileLaunch, swarm: &SwarmConfig) -> Self {
        let estimate: TargetEstimate = swarm.initial_estimate.map(Vec2::from).into();

        let missile = Self {
            id,
            mode,
            role: launch.role,
            status: AgentStatus::Active,
            position: launch.position,
            cell: launch.cell,
            direction: Vec2::default_heading(),
            base_speed: swarm.base_speed,
            current_speed: swarm.base_speed,
            min_speed: swarm.min_speed,
            max_speed: swarm.max_speed,
            fuel: swarm.fuel,
            initial_fuel: swarm.fuel,
            recon_state: launch.recon_state,
            wave_id: launch.wave_id,
            estimate,
            inbox: Vec::new(),
            comms_range: swarm.comms_range,
            sensor: launch.sensor,
            launch_tick: launch.launch_tick,
            ticks_flown: 0,
            distance_travelled: 0.0,
            cumulative_reward: 0.0,
            end_reason: None,
            trail: vec![launch.cell],
        };

        info!(
            missile_id = id,
            mode = %mode,
            role = ?missile.role,
            wave_id = missile.wave_id,
            launch_tick = missile.launch_tick,
            launch_position_x = missile.position.x,
            launch_position_y = missile.position.y,
            fuel = missile.fuel,
            "MISSILE_LAUNCHED: ミサイルが発射されました"
        );

        missile
    }

    pub fn is_alive(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// 命中して爆発したか
    pub fn exploded(&self) -> bool {
        self.status == AgentStatus::Exploded
    }

    pub fn clear_inbox(&mut self) {
        self.inbox.clear();
    }

    /// 今ティックの送信内容
    pub fn broadcast(&self) -> Broadcast {
        Broadcast {
            message: Message {
                sender_id: self.id,
                position: self.position,
                target_estimate: self.estimate,
                speed: self.current_speed,
                fuel: self.fuel,
                wave_id: self.wave_id,
                role: self.role,
            },
            comms_range: self.comms_range,
        }
    }

    /// 受信したメッセージで受信箱を置き換え
    pub fn receive(&mut self, messages: Vec<Message>) {
        self.inbox = messages;
    }

    /// TRUからの推定で融合推定を上書き（不明な推定は無視）
    pub fn apply_reporting(&mut self, estimate: TargetEstimate) {
        if estimate.is_known() {
            self.estimate = estimate;
        }
    }

    /// 学習方策向けの観測
    pub fn observation(&self, grid: &Grid) -> Observation {
        Observation::build(
            self.position,
            self.estimate,
            self.fuel,
            self.initial_fuel,
            self.role,
            grid.width as f64,
            grid.height as f64,
        )
    }

    fn distance_to_estimate(&self) -> Option<f64> {
        self.estimate.position().map(|p| self.position.distance(&p))
    }

    /// 1ティック分の処理
    ///
    /// # 引数
    ///
    /// * `ctx` - 目標・グリッド・誘導パラメータ
    /// * `action` - 学習方策モードで選択済みの行動
    /// * `rng` - 乱数源
    ///
    /// # 戻り値
    ///
    /// 今ティックに終了した場合はその理由
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        ctx: &StepContext<'_>,
        action: Option<PolicyAction>,
        rng: &mut R,
    ) -> Option<MissileEndReason> {
        if !self.is_alive() {
            return None;
        }

        let previous_distance = self.distance_to_estimate();

        let input = GuidanceInput {
            id: self.id,
            position: self.position,
            direction: self.direction,
            current_speed: self.current_speed,
            base_speed: self.base_speed,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            role: self.role,
            recon_state: self.recon_state,
            wave_id: self.wave_id,
            estimate: self.estimate,
            sensor: &self.sensor,
            inbox: &self.inbox,
            true_target: ctx.target.map(|(position, _)| position),
            config: ctx.guidance,
        };
        let command = guidance::dispatch(self.mode, &input, action, rng);

        let outcome = self.apply_command(command, ctx);

        if self.mode == SwarmMode::Learned {
            let current_distance = self.distance_to_estimate();
            let progress = match (previous_distance, current_distance) {
                (Some(before), Some(after)) => (before, after),
                _ => (0.0, 0.0),
            };
            let hit = outcome == Some(MissileEndReason::Hit);
            let reward = policy::reward(progress.0, progress.1, hit, outcome.is_some() && !hit);
            self.cumulative_reward += reward;
        }

        outcome
    }

    /// 誘導指令の適用（速度クランプ → 燃料 → 移動 → 衝突判定）
    pub fn apply_command(&mut self, command: GuidanceCommand, ctx: &StepContext<'_>) -> Option<MissileEndReason> {
        self.estimate = command.estimate;
        self.recon_state = command.recon_state;

        if command.self_destruct {
            return Some(self.terminate(MissileEndReason::DecoySelfDestruct));
        }

        // 非有限・退化した方向はこのミサイルだけの致命的エラー
        let Some(direction) = command.direction.normalized(ctx.guidance.epsilon) else {
            warn!(
                missile_id = self.id,
                direction = ?command.direction,
                "MISSILE_GUIDANCE_FAILURE: 誘導方向が不正です"
            );
            return Some(self.terminate(MissileEndReason::GuidanceFailure));
        };
        debug_assert!(direction.is_unit(UNIT_EPSILON));
        self.direction = direction;

        self.current_speed = if command.speed.is_finite() {
            command.speed.clamp(self.min_speed, self.max_speed)
        } else {
            self.base_speed
        };

        self.fuel = self.fuel.saturating_sub(1);
        if self.fuel == 0 {
            return Some(self.terminate(MissileEndReason::FuelExhausted));
        }

        let previous = self.position;
        self.position = ctx.grid.confine(self.position + self.direction * self.current_speed);
        self.distance_travelled += previous.distance(&self.position);
        self.ticks_flown += 1;

        // 移動したティックは同じセルに留まっても記録する
        self.cell = ctx.grid.to_cell(self.position);
        self.trail.push(self.cell);

        match ctx.target {
            Some((_, target_cell)) if target_cell == self.cell => {
                if self.mode == SwarmMode::Decoy {
                    Some(self.terminate(MissileEndReason::DecoySelfDestruct))
                } else {
                    Some(self.terminate(MissileEndReason::Hit))
                }
            }
            _ => None,
        }
    }

    fn terminate(&mut self, reason: MissileEndReason) -> MissileEndReason {
        self.status = reason.status();
        self.end_reason = Some(reason);

        match reason {
            MissileEndReason::Hit => info!(
                missile_id = self.id,
                role = ?self.role,
                hit_cell = %self.cell,
                ticks_flown = self.ticks_flown,
                fuel_remaining = self.fuel,
                "MISSILE_HIT: ミサイルが目標に命中しました"
            ),
            MissileEndReason::FuelExhausted => debug!(
                missile_id = self.id,
                position_x = self.position.x,
                position_y = self.position.y,
                ticks_flown = self.ticks_flown,
                "MISSILE_FUEL_EXHAUSTED: ミサイルの燃料が尽きました"
            ),
            MissileEndReason::DecoySelfDestruct => info!(
                missile_id = self.id,
                cell = %self.cell,
                "MISSILE_SELF_DESTRUCT: デコイが自爆しました"
            ),
            MissileEndReason::GuidanceFailure => {}
        }

        reason
    }
}

impl IAgent for MissileUnit {
    fn get_id(&self) -> AgentId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Missile
    }

    fn is_active(&self) -> bool {
        self.is_alive()
    }

    fn cell(&self) -> GridCell {
        self.cell
    }

    fn trail(&self) -> &[GridCell] {
        &self.trail
    }
}

impl IMovable for MissileUnit {
    fn get_position(&self) -> Vec2 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::grid::Topology;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn missile(mode: SwarmMode, fuel: u32, estimate: Option<Vec2>) -> MissileUnit {
        let swarm = SwarmConfig {
            mode,
            fuel,
            ..SwarmConfig::default()
        };
        let mut unit = MissileUnit::launch(
            1,
            mode,
            MissileLaunch {
                role: MissileRole::Attacker,
                wave_id: 0,
                recon_state: None,
                sensor: Sensor::new(30.0, 90.0, 0.0),
                position: Vec2::new(0.0, 10.0),
                cell: GridCell::new(0, 10),
                launch_tick: 0,
            },
            &swarm,
        );
        unit.estimate = estimate.into();
        unit
    }

    #[test]
    fn test_fuel_decreases_and_terminates_at_zero() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig::default();
        let ctx = StepContext { target: None, grid: &grid, guidance: &config };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut unit = missile(SwarmMode::Independent, 3, Some(Vec2::new(90.0, 10.0)));

        assert_eq!(unit.step(&ctx, None, &mut rng), None);
        assert_eq!(unit.fuel, 2);
        assert_eq!(unit.step(&ctx, None, &mut rng), None);
        assert_eq!(unit.fuel, 1);
        assert_eq!(unit.position, Vec2::new(2.0, 10.0));

        // 燃料0になったティックは移動しない
        assert_eq!(unit.step(&ctx, None, &mut rng), Some(MissileEndReason::FuelExhausted));
        assert_eq!(unit.fuel, 0);
        assert_eq!(unit.position, Vec2::new(2.0, 10.0));
        assert_eq!(unit.status, AgentStatus::Depleted);
        assert!(!unit.exploded());

        // 終了後は何もしない
        assert_eq!(unit.step(&ctx, None, &mut rng), None);
        assert_eq!(unit.fuel, 0);
    }

    #[test]
    fn test_trail_grows_every_tick_flown() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig::default();
        let ctx = StepContext { target: None, grid: &grid, guidance: &config };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut unit = missile(SwarmMode::Independent, 50, Some(Vec2::new(90.0, 10.0)));
        unit.base_speed = 0.1;
        unit.current_speed = 0.1;

        for _ in 0..4 {
            assert_eq!(unit.step(&ctx, None, &mut rng), None);
        }

        // 低速で同じセルに留まっても毎ティック記録される
        assert_eq!(unit.ticks_flown, 4);
        assert_eq!(unit.trail().len() as u64, 1 + unit.ticks_flown);
        assert!(unit.trail().iter().all(|cell| *cell == GridCell::new(0, 10)));
        assert_eq!(unit.trail().last(), Some(&unit.cell));
    }

    #[test]
    fn test_learned_mode_accumulates_reward() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig::default();
        let ctx = StepContext { target: None, grid: &grid, guidance: &config };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut unit = missile(SwarmMode::Learned, 50, Some(Vec2::new(90.0, 10.0)));

        // 前進1ティックごとに 10 × 1.0 − 1
        unit.step(&ctx, Some(PolicyAction::Forward), &mut rng);
        assert!((unit.cumulative_reward - 9.0).abs() < 1e-9);
        unit.step(&ctx, Some(PolicyAction::Forward), &mut rng);
        assert!((unit.cumulative_reward - 18.0).abs() < 1e-9);
        assert!((unit.distance_travelled - 2.0).abs() < 1e-9);

        // 学習方策以外のモードでは報酬を積算しない
        let mut scripted = missile(SwarmMode::Independent, 50, Some(Vec2::new(90.0, 10.0)));
        scripted.step(&ctx, None, &mut rng);
        assert_eq!(scripted.cumulative_reward, 0.0);
    }

    #[test]
    fn test_entering_target_cell_explodes() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig::default();
        let target = Vec2::new(2.0, 10.0);
        let ctx = StepContext { target: Some((target, grid.to_cell(target))), grid: &grid, guidance: &config };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut unit = missile(SwarmMode::Independent, 50, Some(target));

        assert_eq!(unit.step(&ctx, None, &mut rng), None);
        assert_eq!(unit.step(&ctx, None, &mut rng), Some(MissileEndReason::Hit));
        assert!(unit.exploded());
        assert_eq!(unit.trail(), &[GridCell::new(0, 10), GridCell::new(1, 10), GridCell::new(2, 10)]);
    }

    #[test]
    fn test_decoy_in_target_cell_self_destructs() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig {
            decoy_diverge_distance: 0.0,
            decoy_self_destruct_distance: 0.0,
            ..GuidanceConfig::default()
        };
        let target = Vec2::new(1.0, 10.0);
        let ctx = StepContext { target: Some((target, grid.to_cell(target))), grid: &grid, guidance: &config };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut unit = missile(SwarmMode::Decoy, 50, Some(target));

        assert_eq!(unit.step(&ctx, None, &mut rng), Some(MissileEndReason::DecoySelfDestruct));
        assert_eq!(unit.status, AgentStatus::SelfDestruct);
        assert!(!unit.exploded());
    }

    #[test]
    fn test_speed_request_is_clamped() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig::default();
        let ctx = StepContext { target: None, grid: &grid, guidance: &config };
        let mut unit = missile(SwarmMode::Independent, 50, None);

        let command = GuidanceCommand {
            direction: Vec2::new(1.0, 0.0),
            speed: 9.0,
            estimate: TargetEstimate::Unknown,
            recon_state: None,
            self_destruct: false,
        };
        unit.apply_command(command, &ctx);
        assert_eq!(unit.current_speed, 2.0);

        unit.apply_command(GuidanceCommand { speed: 0.0, ..command }, &ctx);
        assert_eq!(unit.current_speed, 0.1);
    }

    #[test]
    fn test_non_finite_direction_fails_only_this_missile() {
        let grid = Grid::new(100, 20, Topology::Clamped);
        let config = GuidanceConfig::default();
        let ctx = StepContext { target: None, grid: &grid, guidance: &config };
        let mut unit = missile(SwarmMode::Independent, 50, None);

        let command = GuidanceCommand {
            direction: Vec2::new(f64::NAN, 0.0),
            speed: 1.0,
            estimate: TargetEstimate::Unknown,
            recon_state: None,
            self_destruct: false,
        };
        assert_eq!(unit.apply_command(command, &ctx), Some(MissileEndReason::GuidanceFailure));
        assert_eq!(unit.status, AgentStatus::Depleted);
        assert_eq!(unit.position, Vec2::new(0.0, 10.0));
    }

    #[test]
    fn test_reporting_overwrites_only_with_known_estimate() {
        let mut unit = missile(SwarmMode::Independent, 50, Some(Vec2::new(5.0, 5.0)));
        unit.apply_reporting(TargetEstimate::Unknown);
        assert_eq!(unit.estimate, TargetEstimate::Known(Vec2::new(5.0, 5.0)));
        unit.apply_reporting(TargetEstimate::Known(Vec2::new(6.0, 6.0)));
        assert_eq!(unit.estimate, TargetEstimate::Known(Vec2::new(6.0, 6.0)));
    }

    #[test]
    fn test_direction_stays_unit_over_random_runs() {
        let grid = Grid::new(60, 30, Topology::Toroidal);
        let config = GuidanceConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(77);

        for mode in SwarmMode::ALL {
            let mut unit = missile(mode, 200, Some(Vec2::new(40.0, 12.0)));
            let target = Vec2::new(40.0, 12.0);
            let ctx = StepContext { target: Some((target, grid.to_cell(target))), grid: &grid, guidance: &config };
            let mut last_fuel = unit.fuel;
            while unit.is_alive() {
                let action = PolicyAction::from_index(rng.gen_range(0..5));
                unit.step(&ctx, action, &mut rng);
                assert!(unit.direction.is_unit(UNIT_EPSILON), "{mode}: {:?}", unit.direction);
                // 自爆は燃料消費前に判定される
                assert!(unit.fuel < last_fuel || !unit.is_alive());
                last_fuel = unit.fuel;
            }
        }
    }
}
