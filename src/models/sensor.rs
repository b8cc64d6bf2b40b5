use rand::Rng;
use rand_distr::StandardNormal;
use crate::models::{
    traits::ISensor,
    common::{Vec2, math_utils},
};
use crate::scenario::SensorConfig;

/// 指向性センサー
///
/// 探知距離・視野角・ガウス雑音の3パラメータだけを持つ不変のセンサーモデルです。
/// 内部状態を持たないため、複数の呼び出しやエージェント間で安全に共有できます。
/// 目標を保持するTRUやミサイルがそれぞれ1つずつ組み込んで使用します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensor {
    /// 探知範囲（グリッド単位、円形半径）
    range: f64,
    /// 視野角（度、進行方向を中心とした全幅）
    field_of_view_deg: f64,
    /// 相対位置の各軸に加える雑音の標準偏差
    noise_std: f64,
}

impl Sensor {
    /// 新しいセンサーを作成します
    ///
    /// # 引数
    ///
    /// * `range` - 探知距離
    /// * `field_of_view_deg` - 視野角（度）
    /// * `noise_std` - 雑音の標準偏差（0で雑音なし）
    pub fn new(range: f64, field_of_view_deg: f64, noise_std: f64) -> Self {
        Self {
            range,
            field_of_view_deg,
            noise_std: noise_std.max(0.0),
        }
    }

    /// 探知範囲内かどうかの判定
    ///
    /// # 引数
    ///
    /// * `relative` - センサーから目標への相対ベクトル
    pub fn is_in_detection_range(&self, relative: Vec2) -> bool {
        relative.magnitude() <= self.range
    }

    /// 視野内かどうかの判定
    ///
    /// 目標方位と進行方向との角度差を(-180度, 180度]に正規化し、
    /// その絶対値が視野角の半分以下であれば視野内とします。
    ///
    /// # 引数
    ///
    /// * `heading` - センサーの向き（ゼロベクトル不可）
    /// * `relative` - センサーから目標への相対ベクトル
    pub fn is_in_field_of_view(&self, heading: Vec2, relative: Vec2) -> bool {
        let bearing_diff = math_utils::angle_difference(heading.angle_deg(), relative.angle_deg());
        bearing_diff.abs() <= self.field_of_view_deg / 2.0
    }
}

impl From<&SensorConfig> for Sensor {
    fn from(config: &SensorConfig) -> Self {
        Sensor::new(config.range, config.field_of_view_deg, config.noise_std)
    }
}

impl ISensor for Sensor {
    fn detect<R: Rng + ?Sized>(
        &self,
        origin: Vec2,
        heading: Vec2,
        target: Vec2,
        rng: &mut R,
    ) -> Option<Vec2> {
        let relative = target - origin;

        if !self.is_in_detection_range(relative) {
            return None; // 範囲外
        }

        if !self.is_in_field_of_view(heading, relative) {
            return None; // 視野外
        }

        // 各軸に独立なゼロ平均ガウス雑音を付加
        let noise_x: f64 = rng.sample::<f64, _>(StandardNormal) * self.noise_std;
        let noise_y: f64 = rng.sample::<f64, _>(StandardNormal) * self.noise_std;

        Some(Vec2::new(relative.x + noise_x, relative.y + noise_y))
    }
}
