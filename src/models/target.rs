use rand::Rng;
use tracing::trace;
use crate::models::{
    traits::{IAgent, IMovable},
    common::{AgentId, AgentKind, AgentStatus, GridCell, Vec2},
    grid::Grid,
};
use crate::scenario::TargetConfig;

/// 目標エージェント
///
/// スクリプト化された非反応型の移動目標です。X座標を固定したまま
/// Y軸方向に往復し、一定ティック数（ランダム）ごとに向きを反転します。
/// 他のどのコンポーネントにも依存しません。
#[derive(Debug, Clone)]
pub struct TargetEntity {
    /// 目標の一意識別子
    pub id: AgentId,
    /// 連続座標
    pub position: Vec2,
    /// 現在の格子セル（命中判定に使用）
    pub cell: GridCell,
    /// 目標の現在状態
    pub status: AgentStatus,
    /// Y軸方向の移動向き（+1 / -1）
    pub direction: f64,
    /// 1ティックあたりの移動量
    pub speed: f64,
    /// 現在の移動フェーズの残りティック数
    pub steps_remaining_in_phase: u32,
    /// フェーズ長の最小値（ティック）
    pub phase_min_ticks: u32,
    /// フェーズ長の最大値（ティック）
    pub phase_max_ticks: u32,
    /// 移動履歴
    pub trail: Vec<GridCell>,
}

impl TargetEntity {
    /// 新しい目標を作成
    ///
    /// # 引数
    ///
    /// * `id` - 目標の一意識別子
    /// * `position` - 初期位置
    /// * `config` - 速度・フェーズ長の設定
    /// * `grid` - 初期セル計算に使うグリッド
    /// * `rng` - 最初のフェーズ長を決める乱数源
    pub fn new<R: Rng + ?Sized>(
        id: AgentId,
        position: Vec2,
        config: &TargetConfig,
        grid: &Grid,
        rng: &mut R,
    ) -> Self {
        let phase_min_ticks = config.phase_min_ticks.max(1);
        let phase_max_ticks = config.phase_max_ticks.max(phase_min_ticks);
        let cell = grid.to_cell(position);

        Self {
            id,
            position,
            cell,
            status: AgentStatus::Active,
            direction: 1.0,
            speed: config.speed,
            steps_remaining_in_phase: rng.gen_range(phase_min_ticks..=phase_max_ticks),
            phase_min_ticks,
            phase_max_ticks,
            trail: vec![cell],
        }
    }

    /// 1ティック分のスクリプト移動
    ///
    /// フェーズが終了していれば向きを反転して新しいフェーズ長を抽選し、
    /// Y座標をグリッドの縦範囲内で更新します。
    pub fn tick<R: Rng + ?Sized>(&mut self, grid: &Grid, rng: &mut R) {
        if self.steps_remaining_in_phase == 0 {
            self.direction = -self.direction;
            self.steps_remaining_in_phase = rng.gen_range(self.phase_min_ticks..=self.phase_max_ticks);
        }

        let new_y = grid.clamp_y(self.position.y + self.direction * self.speed);
        self.position = Vec2::new(self.position.x, new_y);

        self.cell = grid.to_cell(self.position);
        self.trail.push(self.cell);

        self.steps_remaining_in_phase -= 1;

        trace!(
            target_id = self.id,
            position_x = self.position.x,
            position_y = self.position.y,
            direction = self.direction,
            "TARGET_MOVED: 目標が移動しました"
        );
    }
}

impl IAgent for TargetEntity {
    fn get_id(&self) -> AgentId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Target
    }

    fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    fn cell(&self) -> GridCell {
        self.cell
    }

    fn trail(&self) -> &[GridCell] {
        &self.trail
    }
}

impl IMovable for TargetEntity {
    fn get_position(&self) -> Vec2 {
        self.position
    }
}
