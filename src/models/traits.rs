use rand::{Rng, RngCore};
use crate::models::common::*;
use crate::models::guidance::{GuidanceCommand, GuidanceInput};
use crate::models::policy::{Observation, PolicyAction};

/// 全てのシミュレーションエージェントが実装する基本インターフェース
pub trait IAgent {
    /// エージェントIDの取得
    fn get_id(&self) -> AgentId;

    /// エージェント種別の取得
    fn kind(&self) -> AgentKind;

    /// エージェントがアクティブかどうか
    fn is_active(&self) -> bool;

    /// 現在の格子セル
    fn cell(&self) -> GridCell;

    /// 移動履歴（セル列）
    fn trail(&self) -> &[GridCell];
}

/// 移動可能なエージェントのインターフェース
pub trait IMovable {
    /// 現在の連続座標
    fn get_position(&self) -> Vec2;
}

/// センサーのインターフェース
pub trait ISensor {
    /// 目標の探知
    ///
    /// 探知できた場合は雑音付きの相対オフセットを返します。
    /// `heading` はゼロベクトルであってはなりません（呼び出し側の責務）。
    fn detect<R: Rng + ?Sized>(
        &self,
        origin: Vec2,
        heading: Vec2,
        target: Vec2,
        rng: &mut R,
    ) -> Option<Vec2>;
}

/// 誘導戦略のインターフェース
///
/// 自機状態・今ティックの受信メッセージ・（許可された場合のみ）真の目標位置から
/// 進行方向と速度要求を決定する純粋関数です。状態の更新は呼び出し側が行います。
pub trait IGuidance {
    fn decide<R: Rng + ?Sized>(&self, input: &GuidanceInput<'_>, rng: &mut R) -> GuidanceCommand;
}

/// 学習方策のインターフェース
pub trait IPolicy: std::fmt::Debug {
    /// 観測から離散行動を選択
    fn select_action(&mut self, observation: &Observation, rng: &mut dyn RngCore) -> PolicyAction;
}
