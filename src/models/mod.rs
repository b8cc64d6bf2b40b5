// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// 格子と占有インデックス
pub mod grid;

// 各エージェントモデルの実装
pub mod sensor;
pub mod target;
pub mod reporting_unit;
pub mod missile;

// スウォーム協調（通信・誘導・学習方策）
pub mod comms;
pub mod guidance;
pub mod policy;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use grid::{Grid, OccupancyIndex, Topology};
pub use sensor::Sensor;
pub use target::TargetEntity;
pub use reporting_unit::ReportingUnit;
pub use missile::{MissileEndReason, MissileLaunch, MissileUnit, StepContext};
pub use comms::{Broadcast, CommsStats, CommunicationLayer, Message};
pub use guidance::{GuidanceCommand, GuidanceInput, MissileRole, ReconState, SwarmMode};
pub use policy::{Observation, PolicyAction, RandomPolicy};
