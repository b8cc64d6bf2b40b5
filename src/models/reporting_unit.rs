use rand::Rng;
use tracing::debug;
use crate::models::{
    traits::{IAgent, ISensor},
    common::{AgentId, AgentKind, AgentStatus, GridCell, TargetEstimate, Vec2},
    sensor::Sensor,
};

/// 目標報告ユニット（TRU）
///
/// 固定配置のセンシング資産です。`update_interval` ティックごとにだけ
/// センサーを動作させ、目標の絶対位置推定を `latest_estimate` に保持します。
/// スケジューラがこの推定を全ミサイルへ配信します。
///
/// 探知に失敗した場合（範囲外・視野外・目標参照なし）は推定を `Unknown` に
/// 戻し、古い推定を現在値として報告し続けることはありません。
#[derive(Debug, Clone)]
pub struct ReportingUnit {
    pub id: AgentId,
    pub position: Vec2,
    pub cell: GridCell,
    /// センサーの向き（単位ベクトル）
    pub heading: Vec2,
    pub sensor: Sensor,
    pub status: AgentStatus,
    /// センシング周期（ティック）
    pub update_interval: u32,
    /// 前回センシングからの経過ティック数
    pub ticks_since_update: u32,
    pub latest_estimate: TargetEstimate,
    /// 実施したセンシング回数
    pub sensing_count: u64,
    trail: Vec<GridCell>,
}

impl ReportingUnit {
    /// 新しいTRUを作成
    ///
    /// 初回ティック（tick 0）で必ずセンシングするよう、経過カウンタは
    /// 周期値で初期化されます。
    pub fn new(
        id: AgentId,
        position: Vec2,
        cell: GridCell,
        heading: Vec2,
        sensor: Sensor,
        update_interval: u32,
    ) -> Self {
        let update_interval = update_interval.max(1);
        Self {
            id,
            position,
            cell,
            heading: heading.normalized(1e-9).unwrap_or(Vec2::default_heading()),
            sensor,
            status: AgentStatus::Active,
            update_interval,
            ticks_since_update: update_interval,
            latest_estimate: TargetEstimate::Unknown,
            sensing_count: 0,
            trail: vec![cell],
        }
    }

    /// 今ティックがセンシング周期に当たるか
    pub fn is_update_due(&self) -> bool {
        self.ticks_since_update >= self.update_interval
    }

    /// 1ティック分の処理（デューティサイクル付きセンシング）
    ///
    /// # 引数
    ///
    /// * `target_position` - 真の目標位置。目標が存在しない場合は `None`
    /// * `rng` - センサー雑音用の乱数源
    ///
    /// # 戻り値
    ///
    /// 今ティックにセンシングを実施した場合はtrue
    pub fn tick<R: Rng + ?Sized>(&mut self, target_position: Option<Vec2>, rng: &mut R) -> bool {
        let sensed = self.is_update_due();
        if sensed {
            self.sense(target_position, rng);
            self.ticks_since_update = 0;
        }
        self.ticks_since_update = self.ticks_since_update.saturating_add(1);
        sensed
    }

    fn sense<R: Rng + ?Sized>(&mut self, target_position: Option<Vec2>, rng: &mut R) {
        self.sensing_count += 1;

        let offset = target_position
            .and_then(|target| self.sensor.detect(self.position, self.heading, target, rng));

        self.latest_estimate = match offset {
            Some(offset) => TargetEstimate::Known(self.position + offset),
            None => TargetEstimate::Unknown,
        };

        debug!(
            tru_id = self.id,
            detected = self.latest_estimate.is_known(),
            estimate = ?self.latest_estimate,
            sensing_count = self.sensing_count,
            "TRU_SENSING: TRUが目標をセンシングしました"
        );
    }
}

impl IAgent for ReportingUnit {
    fn get_id(&self) -> AgentId {
        self.id
    }

    fn kind(&self) -> AgentKind {
        AgentKind::ReportingUnit
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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tru(update_interval: u32) -> ReportingUnit {
        ReportingUnit::new(
            1,
            Vec2::new(0.0, 0.0),
            GridCell::new(0, 0),
            Vec2::new(1.0, 0.0),
            Sensor::new(50.0, 120.0, 0.0),
            update_interval,
        )
    }

    #[test]
    fn test_refreshes_only_on_interval_ticks() {
        let mut unit = tru(5);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let mut refresh_ticks = Vec::new();
        for tick in 0..12u32 {
            // 目標を毎ティック動かし、中間ティックで推定が変わらないことを確認
            let target = Vec2::new(10.0 + tick as f64, 0.0);
            let before = unit.latest_estimate;
            if unit.tick(Some(target), &mut rng) {
                refresh_ticks.push(tick);
                assert_eq!(unit.latest_estimate, TargetEstimate::Known(target));
            } else {
                assert_eq!(unit.latest_estimate, before);
            }
        }
        assert_eq!(refresh_ticks, vec![0, 5, 10]);
    }

    #[test]
    fn test_failed_detection_blanks_estimate() {
        let mut unit = tru(1);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        unit.tick(Some(Vec2::new(20.0, 0.0)), &mut rng);
        assert!(unit.latest_estimate.is_known());

        // 視野外
        unit.tick(Some(Vec2::new(-20.0, 0.0)), &mut rng);
        assert_eq!(unit.latest_estimate, TargetEstimate::Unknown);

        unit.tick(Some(Vec2::new(20.0, 0.0)), &mut rng);
        assert!(unit.latest_estimate.is_known());

        // 目標参照なし
        unit.tick(None, &mut rng);
        assert_eq!(unit.latest_estimate, TargetEstimate::Unknown);
    }
}
