//! 描画・記録向けのシミュレーション状態スナップショット
//!
//! コアは描画を行わず、外部のレンダラーやログにこの構造体を渡します。
//! 終了済みミサイルも含まれます。

use serde::Serialize;
use crate::models::{
    AgentId, AgentKind, AgentStatus, GridCell, IAgent, IMovable, MissileEndReason, MissileRole,
    MissileUnit, ReportingUnit, SwarmMode, TargetEntity, Vec2,
};

/// 1エージェント分の状態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub kind: AgentKind,
    pub cell: GridCell,
    pub position: Vec2,
    pub status: AgentStatus,
    pub alive: bool,
    pub exploded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MissileRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<MissileEndReason>,
    /// 累積移動距離（ミサイルのみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_travelled: Option<f64>,
    /// 学習方策モードの累積報酬（ミサイルのみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_reward: Option<f64>,
    pub trail: Vec<GridCell>,
}

impl AgentSnapshot {
    fn of<A: IAgent>(agent: &A, position: Vec2, status: AgentStatus) -> Self {
        Self {
            id: agent.get_id(),
            kind: agent.kind(),
            cell: agent.cell(),
            position,
            status,
            alive: agent.is_active(),
            exploded: status == AgentStatus::Exploded,
            role: None,
            end_reason: None,
            distance_travelled: None,
            cumulative_reward: None,
            trail: agent.trail().to_vec(),
        }
    }
}

impl From<&TargetEntity> for AgentSnapshot {
    fn from(target: &TargetEntity) -> Self {
        AgentSnapshot::of(target, target.get_position(), target.status)
    }
}

impl From<&ReportingUnit> for AgentSnapshot {
    fn from(unit: &ReportingUnit) -> Self {
        AgentSnapshot::of(unit, unit.position, unit.status)
    }
}

impl From<&MissileUnit> for AgentSnapshot {
    fn from(missile: &MissileUnit) -> Self {
        Self {
            role: Some(missile.role),
            end_reason: missile.end_reason,
            distance_travelled: Some(missile.distance_travelled),
            cumulative_reward: (missile.mode == SwarmMode::Learned).then_some(missile.cumulative_reward),
            ..AgentSnapshot::of(missile, missile.get_position(), missile.status)
        }
    }
}

/// 1ティック時点の全体状態
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub mode: SwarmMode,
    pub width: i64,
    pub height: i64,
    pub agents: Vec<AgentSnapshot>,
}

impl SimulationSnapshot {
    /// 生存中のミサイル数
    pub fn active_missiles(&self) -> usize {
        self.missiles().filter(|a| a.alive).count()
    }

    /// 命中したミサイル数
    pub fn exploded_missiles(&self) -> usize {
        self.missiles().filter(|a| a.exploded).count()
    }

    pub fn missiles(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.agents.iter().filter(|a| a.kind == AgentKind::Missile)
    }

    /// YAML形式で出力
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
