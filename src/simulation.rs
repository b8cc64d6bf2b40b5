//! # Simulation モジュール
//!
//! スウォーム対移動目標シミュレーションの中核となるスケジューラを提供します。
//!
//! 離散ティック駆動で、目標・TRU・ミサイルの全エージェントを安定IDで保持し、
//! 1ティックを固定の5フェーズで進めます。
//!
//! ## ティック処理順序
//!
//! 1. **受信箱クリア**: 全ミサイルの受信箱を空にする
//! 2. **通信**: 生存ミサイル間でメッセージを交換（送信元の通信距離以内のみ）
//! 3. **発射**: 発射間隔が経過しクォータが残っていれば1機発射
//! 4. **TRU配信**: TRUの既知推定を全生存ミサイルへ上書き配信
//! 5. **エージェント処理**: 全エージェントをランダム順で1ステップ
//!
//! その後、終了したミサイルを退役リストへ移し、ティックを進めます。
//! 実行は最大ティック数に達するか、全機発射済みかつ全機終了で完了します。
//!
//! ## 使用例
//!
//! ```no_run
//! use swarmsim::simulation::SimulationEngine;
//! use swarmsim::scenario::ScenarioConfig;
//!
//! let config = ScenarioConfig::from_file("scenarios/default.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! let summary = engine.run()?;
//! println!("命中: {}", summary.hits);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, trace};
use crate::models::*;
use crate::scenario::ScenarioConfig;
use crate::snapshot::{AgentSnapshot, SimulationSnapshot};

/// フェーズ5で処理順をシャッフルするためのエージェント参照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentRef {
    Target,
    ReportingUnit(usize),
    Missile(AgentId),
}

/// 実行結果の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub launched: u32,
    pub hits: u32,
    pub fuel_exhausted: u32,
    pub self_destructs: u32,
    pub guidance_failures: u32,
    pub active: u32,
    pub messages_delivered: u64,
}

impl RunSummary {
    fn record(&mut self, reason: MissileEndReason) {
        match reason {
            MissileEndReason::Hit => self.hits += 1,
            MissileEndReason::FuelExhausted => self.fuel_exhausted += 1,
            MissileEndReason::DecoySelfDestruct => self.self_destructs += 1,
            MissileEndReason::GuidanceFailure => self.guidance_failures += 1,
        }
    }
}

pub struct SimulationEngine {
    pub tick: u64,
    pub max_ticks: u64,
    pub seed: u64,
    pub mode: SwarmMode,

    pub grid: Grid,
    pub occupancy: OccupancyIndex,

    pub target: Option<TargetEntity>,
    pub reporting_units: Vec<ReportingUnit>,
    /// 生存中のミサイル（安定IDで保持）
    pub missiles: BTreeMap<AgentId, MissileUnit>,
    /// 終了済みのミサイル
    pub retired: Vec<MissileUnit>,

    pub comms: CommunicationLayer,
    policy: Box<dyn IPolicy>,
    rng: ChaCha8Rng,

    next_id: AgentId,
    launched: u32,
    scouts_launched: u32,
    last_launch_tick: Option<u64>,
    summary: RunSummary,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
}

impl SimulationEngine {
    /// 新しいエンジンを作成
    ///
    /// シードが未指定の場合はエントロピーから生成し、ログに記録します。
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let seed = scenario.sim.seed.unwrap_or_else(rand::random);
        let world = &scenario.world;
        let grid = Grid::new(world.width, world.height, world.topology);

        Self {
            tick: 0,
            max_ticks: scenario.sim.max_ticks,
            seed,
            mode: scenario.swarm.mode,
            grid,
            occupancy: OccupancyIndex::new(),
            target: None,
            reporting_units: Vec::new(),
            missiles: BTreeMap::new(),
            retired: Vec::new(),
            comms: CommunicationLayer::new(),
            policy: Box::new(RandomPolicy::new()),
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 0,
            launched: 0,
            scouts_launched: 0,
            last_launch_tick: None,
            summary: RunSummary::default(),
            scenario_config: scenario,
            verbose_level,
        }
    }

    /// 学習方策モードで使う方策を差し替え
    pub fn with_policy(mut self, policy: Box<dyn IPolicy>) -> Self {
        self.policy = policy;
        self
    }

    fn allocate_id(&mut self) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 目標とTRUを配置
    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.verbose_level > 0 {
            info!(seed = self.seed, mode = %self.mode, "シミュレーションエンジンを初期化中...");
        }

        self.initialize_target()?;
        self.initialize_reporting_units()?;

        info!(
            seed = self.seed,
            mode = %self.mode,
            width = self.grid.width,
            height = self.grid.height,
            missile_quota = self.scenario_config.swarm.missile_count,
            "SIMULATION_INITIALIZED: 初期化完了"
        );

        Ok(())
    }

    fn initialize_target(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let position = self.scenario_config.target_position();
        if !self.grid.contains(position) {
            return Err(format!("目標位置がグリッド外です: {}", position).into());
        }

        let id = self.allocate_id();
        let target = TargetEntity::new(id, position, &self.scenario_config.target, &self.grid, &mut self.rng);
        self.occupancy.place(id, target.cell);

        if self.verbose_level > 1 {
            debug!(target_id = id, position = %position, "目標を配置しました");
        }

        self.target = Some(target);
        Ok(())
    }

    fn initialize_reporting_units(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let config = &self.scenario_config.reporting_unit;
        let position = self.scenario_config.reporting_unit_position();
        let heading = Vec2::from(config.heading);
        let update_interval = config.update_interval;
        let sensor = Sensor::from(&self.scenario_config.sensors.reporting_unit);

        let heading = heading
            .normalized(self.scenario_config.guidance.epsilon)
            .ok_or("TRUの向きがゼロベクトルです")?;

        let id = self.allocate_id();
        let cell = self.grid.to_cell(position);
        let unit = ReportingUnit::new(id, position, cell, heading, sensor, update_interval);
        self.occupancy.place(id, cell);

        if self.verbose_level > 1 {
            debug!(tru_id = id, position = %position, update_interval, "TRUを配置しました");
        }

        self.reporting_units.push(unit);
        Ok(())
    }

    /// 実行完了判定
    pub fn is_finished(&self) -> bool {
        self.tick >= self.max_ticks
            || (self.launched >= self.scenario_config.swarm.missile_count && self.missiles.is_empty())
    }

    /// 完了まで実行
    pub fn run(&mut self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        info!("=== シミュレーション実行開始 ===");

        while !self.is_finished() {
            self.step();

            if self.verbose_level > 2 {
                trace!("ティック: {} (生存: {}機)", self.tick, self.missiles.len());
            }

            if self.tick % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.tick as f64 / self.max_ticks as f64) * 100.0;
                info!("進行状況: {:.1}% ({}/{}ティック)", progress, self.tick, self.max_ticks);
            }
        }

        let summary = self.summary();
        info!(
            ticks = summary.ticks,
            launched = summary.launched,
            hits = summary.hits,
            fuel_exhausted = summary.fuel_exhausted,
            self_destructs = summary.self_destructs,
            guidance_failures = summary.guidance_failures,
            active = summary.active,
            "SIMULATION_COMPLETED: シミュレーション完了"
        );

        Ok(summary)
    }

    /// 1ティック進める
    pub fn step(&mut self) {
        self.clear_inboxes();
        self.process_communications();
        self.process_launch();
        self.process_reporting();
        self.process_agents();
        self.retire_terminated();

        self.tick += 1;
    }

    fn clear_inboxes(&mut self) {
        for missile in self.missiles.values_mut() {
            missile.clear_inbox();
        }
    }

    fn process_communications(&mut self) {
        let broadcasts: Vec<Broadcast> = self
            .missiles
            .values()
            .filter(|m| m.is_alive())
            .map(|m| m.broadcast())
            .collect();

        let inboxes = self.comms.exchange(&broadcasts);
        self.summary.messages_delivered += self.comms.last_stats().deliveries as u64;

        for (broadcast, inbox) in broadcasts.iter().zip(inboxes) {
            if let Some(missile) = self.missiles.get_mut(&broadcast.message.sender_id) {
                missile.receive(inbox);
            }
        }
    }

    /// 発射判定（間隔とクォータ）
    fn launch_due(&self) -> bool {
        let swarm = &self.scenario_config.swarm;
        if self.launched >= swarm.missile_count {
            return false;
        }
        match self.last_launch_tick {
            None => true,
            Some(last) => self.tick - last >= swarm.launch_interval,
        }
    }

    fn process_launch(&mut self) {
        if !self.launch_due() {
            return;
        }

        let swarm = &self.scenario_config.swarm;
        let sensors = &self.scenario_config.sensors;

        let (role, recon_state, sensor_config) = match self.mode {
            SwarmMode::ReconLed if self.scouts_launched < swarm.scout_quota() => {
                (MissileRole::Scout, None, &sensors.scout)
            }
            SwarmMode::ReconLed => (MissileRole::Attacker, Some(ReconState::InitialLoiter), &sensors.attacker),
            _ => (MissileRole::Attacker, None, &sensors.attacker),
        };
        let wave_id = match self.mode {
            SwarmMode::PulseWave => self.launched / swarm.wave_size.max(1),
            _ => 0,
        };

        let position = self.scenario_config.launch_position();
        let launch = MissileLaunch {
            role,
            wave_id,
            recon_state,
            sensor: Sensor::from(sensor_config),
            position,
            cell: self.grid.to_cell(position),
            launch_tick: self.tick,
        };

        let id = self.allocate_id();
        let missile = MissileUnit::launch(id, self.mode, launch, &self.scenario_config.swarm);
        self.occupancy.place(id, missile.cell);
        self.missiles.insert(id, missile);

        self.launched += 1;
        if role == MissileRole::Scout {
            self.scouts_launched += 1;
        }
        self.last_launch_tick = Some(self.tick);
    }

    fn process_reporting(&mut self) {
        for unit in &self.reporting_units {
            if !unit.latest_estimate.is_known() {
                continue;
            }
            for missile in self.missiles.values_mut().filter(|m| m.is_alive()) {
                missile.apply_reporting(unit.latest_estimate);
            }
        }
    }

    fn process_agents(&mut self) {
        let mut order: Vec<AgentRef> = Vec::with_capacity(1 + self.reporting_units.len() + self.missiles.len());
        if self.target.is_some() {
            order.push(AgentRef::Target);
        }
        order.extend((0..self.reporting_units.len()).map(AgentRef::ReportingUnit));
        order.extend(self.missiles.keys().copied().map(AgentRef::Missile));
        order.shuffle(&mut self.rng);

        for agent in order {
            match agent {
                AgentRef::Target => self.process_target(),
                AgentRef::ReportingUnit(index) => self.process_reporting_unit(index),
                AgentRef::Missile(id) => self.process_missile(id),
            }
        }
    }

    fn process_target(&mut self) {
        if let Some(target) = self.target.as_mut() {
            target.tick(&self.grid, &mut self.rng);
            self.occupancy.move_to(target.id, target.cell);
        }
    }

    fn process_reporting_unit(&mut self, index: usize) {
        let target_position = self.target.as_ref().map(|t| t.position);
        if let Some(unit) = self.reporting_units.get_mut(index) {
            unit.tick(target_position, &mut self.rng);
        }
    }

    fn process_missile(&mut self, id: AgentId) {
        let Some(missile) = self.missiles.get_mut(&id) else {
            return;
        };
        if !missile.is_alive() {
            return;
        }

        let action = match self.mode {
            SwarmMode::Learned => {
                let observation = missile.observation(&self.grid);
                Some(self.policy.select_action(&observation, &mut self.rng))
            }
            _ => None,
        };

        let ctx = StepContext {
            target: self.target.as_ref().map(|t| (t.position, t.cell)),
            grid: &self.grid,
            guidance: &self.scenario_config.guidance,
        };

        match missile.step(&ctx, action, &mut self.rng) {
            Some(reason) => {
                self.occupancy.remove(id);
                self.summary.record(reason);
                debug!(missile_id = id, reason = ?reason, tick = self.tick, "MISSILE_TERMINATED: ミサイルが終了しました");
            }
            None => self.occupancy.move_to(id, missile.cell),
        }
    }

    fn retire_terminated(&mut self) {
        let ended: Vec<AgentId> = self
            .missiles
            .iter()
            .filter(|(_, m)| !m.is_alive())
            .map(|(id, _)| *id)
            .collect();

        for id in ended {
            if let Some(missile) = self.missiles.remove(&id) {
                self.retired.push(missile);
            }
        }
    }

    /// 現時点の集計
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.tick,
            launched: self.launched,
            active: self.missiles.len() as u32,
            ..self.summary
        }
    }

    /// 現時点のスナップショット（終了済みミサイルを含む）
    pub fn snapshot(&self) -> SimulationSnapshot {
        let mut agents: Vec<AgentSnapshot> = Vec::with_capacity(
            1 + self.reporting_units.len() + self.missiles.len() + self.retired.len(),
        );
        agents.extend(self.target.iter().map(AgentSnapshot::from));
        agents.extend(self.reporting_units.iter().map(AgentSnapshot::from));
        agents.extend(self.missiles.values().map(AgentSnapshot::from));
        agents.extend(self.retired.iter().map(AgentSnapshot::from));
        agents.sort_by_key(|a| a.id);

        SimulationSnapshot {
            tick: self.tick,
            mode: self.mode,
            width: self.grid.width,
            height: self.grid.height,
            agents,
        }
    }
}
