use std::fmt;
use std::ops::{Add, Sub, Mul};
use serde::{Deserialize, Serialize};

/// 方向ベクトルの単位長判定に使う許容誤差
pub const UNIT_EPSILON: f64 = 1e-9;

/// 2次元の連続座標・ベクトル
///
/// 位置（浮動小数点座標）と方向・相対オフセットの両方に使用します。
/// 格子セル（[`GridCell`]）とは区別して扱います。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// 既定の進行方向（+X軸）
    pub const fn default_heading() -> Self {
        Self { x: 1.0, y: 0.0 }
    }

    /// ベクトルの長さ（ユークリッドノルム）
    pub fn magnitude(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// 2点間のユークリッド距離
    pub fn distance(&self, other: &Vec2) -> f64 {
        (*other - *self).magnitude()
    }

    /// 単位ベクトル化
    ///
    /// 長さが `epsilon` 未満の場合はゼロ除算を避けるため `None` を返します。
    pub fn normalized(&self, epsilon: f64) -> Option<Vec2> {
        let mag = self.magnitude();
        if mag < epsilon || !mag.is_finite() {
            None
        } else {
            Some(Vec2::new(self.x / mag, self.y / mag))
        }
    }

    /// 左手側の法線ベクトル（-y, x）
    pub fn perpendicular(&self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    /// 原点回りに `angle_rad` だけ回転
    pub fn rotated(&self, angle_rad: f64) -> Vec2 {
        let (sin, cos) = angle_rad.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// XY平面での角度（度、+X軸基準、反時計回り）
    pub fn angle_deg(&self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// 単位長（1 ± `tolerance`）かどうか
    pub fn is_unit(&self, tolerance: f64) -> bool {
        self.is_finite() && (self.magnitude() - 1.0).abs() <= tolerance
    }

    /// 複数点の算術平均。空の場合は `None`
    pub fn mean<'a, I>(points: I) -> Option<Vec2>
    where
        I: IntoIterator<Item = &'a Vec2>,
    {
        let mut sum = Vec2::zero();
        let mut count = 0usize;
        for p in points {
            sum = sum + *p;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(sum * (1.0 / count as f64))
        }
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// 離散化された格子セル座標
///
/// 占有管理と描画用。`cell = round(position)` をグリッドの
/// トポロジーに従ってクランプまたはラップしたものです。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i64,
    pub y: i64,
}

impl GridCell {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// エージェントの安定ID（生成順に採番され再利用されない）
pub type AgentId = u64;

/// エージェントの状態を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgentStatus {
    Active,       // アクティブ
    Exploded,     // 命中して爆発（ミサイル）
    Depleted,     // 燃料切れ・誘導不能（ミサイル）
    SelfDestruct, // 自爆（デコイ）
}

/// エージェントの種類を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AgentKind {
    Target,
    ReportingUnit,
    Missile,
}

/// 目標位置の推定値
///
/// 推定が無い状態を明示的な `Unknown` で表し、古い値を
/// 新しい推定として扱うことを型で防ぎます。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub enum TargetEstimate {
    Known(Vec2),
    #[default]
    Unknown,
}

impl TargetEstimate {
    pub fn position(&self) -> Option<Vec2> {
        match self {
            TargetEstimate::Known(p) => Some(*p),
            TargetEstimate::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, TargetEstimate::Known(_))
    }
}

impl From<Option<Vec2>> for TargetEstimate {
    fn from(value: Option<Vec2>) -> Self {
        value.map_or(TargetEstimate::Unknown, TargetEstimate::Known)
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 角度を(-180度, 180度]の範囲に正規化
    pub fn normalize_angle(angle_deg: f64) -> f64 {
        let mut normalized = angle_deg % 360.0;
        if normalized > 180.0 {
            normalized -= 360.0;
        } else if normalized <= -180.0 {
            normalized += 360.0;
        }
        normalized
    }

    /// 2つの角度の差を計算（(-180度, 180度]の範囲）
    pub fn angle_difference(angle1_deg: f64, angle2_deg: f64) -> f64 {
        normalize_angle(angle2_deg - angle1_deg)
    }
}
