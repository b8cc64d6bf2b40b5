use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use thiserror::Error;
use crate::models::common::Vec2;
use crate::models::grid::Topology;
use crate::models::guidance::SwarmMode;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default".to_string(),
            description: "スウォーム対移動目標の標準シナリオ".to_string(),
        }
    }
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 最大ティック数
    pub max_ticks: u64,
    /// 乱数シード（未指定ならエントロピーから生成）
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_ticks: 1000,
            seed: None,
        }
    }
}

/// 世界設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    pub topology: Topology,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 250,
            height: 60,
            topology: Topology::Clamped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Position2D {
    pub x: f64,
    pub y: f64,
}

impl From<Position2D> for Vec2 {
    fn from(p: Position2D) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// スウォーム設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub mode: SwarmMode,
    /// 発射総数（クォータ）
    pub missile_count: u32,
    /// 発射間隔（ティック）
    pub launch_interval: u64,
    /// 発射位置（未指定なら左端中央）
    pub launch_position: Option<Position2D>,
    /// 初期推定（未指定なら `Unknown`）
    pub initial_estimate: Option<Position2D>,
    pub fuel: u32,
    pub base_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub comms_range: f64,
    /// 偵察主導モードでのスカウト比率
    pub scout_fraction: f64,
    /// 波状攻撃モードの1ウェーブあたりの機数
    pub wave_size: u32,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            mode: SwarmMode::Independent,
            missile_count: 25,
            launch_interval: 30,
            launch_position: None,
            initial_estimate: None,
            fuel: 400,
            base_speed: 1.0,
            min_speed: 0.1,
            max_speed: 2.0,
            comms_range: 50.0,
            scout_fraction: 0.3,
            wave_size: 5,
        }
    }
}

impl SwarmConfig {
    /// 偵察主導モードでのスカウト機数（最低1機、総数以下）
    pub fn scout_quota(&self) -> u32 {
        if self.missile_count == 0 {
            return 0;
        }
        let quota = (f64::from(self.missile_count) * self.scout_fraction).round() as u32;
        quota.clamp(1, self.missile_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SensorConfig {
    pub range: f64,
    pub field_of_view_deg: f64,
    pub noise_std: f64,
}

/// 役割ごとのセンサー設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorProfiles {
    pub attacker: SensorConfig,
    pub scout: SensorConfig,
    pub reporting_unit: SensorConfig,
}

impl Default for SensorProfiles {
    fn default() -> Self {
        Self {
            attacker: SensorConfig { range: 30.0, field_of_view_deg: 90.0, noise_std: 0.5 },
            scout: SensorConfig { range: 40.0, field_of_view_deg: 120.0, noise_std: 0.5 },
            reporting_unit: SensorConfig { range: 80.0, field_of_view_deg: 120.0, noise_std: 0.3 },
        }
    }
}

/// 目標設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// 初期位置（未指定なら右端中央）
    pub position: Option<Position2D>,
    pub speed: f64,
    pub phase_min_ticks: u32,
    pub phase_max_ticks: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            position: None,
            speed: 0.5,
            phase_min_ticks: 5,
            phase_max_ticks: 20,
        }
    }
}

/// TRU設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportingUnitConfig {
    /// 配置位置（未指定なら目標の65セル手前）
    pub position: Option<Position2D>,
    pub heading: Position2D,
    pub update_interval: u32,
}

impl Default for ReportingUnitConfig {
    fn default() -> Self {
        Self {
            position: None,
            heading: Position2D { x: 1.0, y: 0.0 },
            update_interval: 1,
        }
    }
}

/// 誘導パラメータ
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// 退化判定のしきい値
    pub epsilon: f64,
    /// 退化時の摂動幅（各軸 ±）
    pub perturbation: f64,
    pub sensor_switch_distance: f64,
    pub final_assault_distance: f64,
    pub loiter_buffer: f64,
    pub loiter_speed_factor: f64,
    pub wave_stagger_increment: f64,
    pub scout_lateral_spread: f64,
    pub terminal_distance: f64,
    pub approach_offset: f64,
    pub cohesion_buffer: f64,
    pub decoy_diverge_distance: f64,
    pub decoy_self_destruct_distance: f64,
    /// 迂回点のXずれ幅 [最小, 最大]
    pub decoy_divert_x: [f64; 2],
    /// 迂回点のYずれ幅 [最小, 最大]
    pub decoy_divert_y: [f64; 2],
    pub policy_turn_rad: f64,
    pub policy_speed_step: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            perturbation: 0.1,
            sensor_switch_distance: 20.0,
            final_assault_distance: 10.0,
            loiter_buffer: 5.0,
            loiter_speed_factor: 0.2,
            wave_stagger_increment: 15.0,
            scout_lateral_spread: 0.3,
            terminal_distance: 40.0,
            approach_offset: 30.0,
            cohesion_buffer: 10.0,
            decoy_diverge_distance: 80.0,
            decoy_self_destruct_distance: 10.0,
            decoy_divert_x: [20.0, 50.0],
            decoy_divert_y: [50.0, 100.0],
            policy_turn_rad: 0.2,
            policy_speed_step: 0.1,
        }
    }
}

/// 完全なシナリオ設定
///
/// すべてのセクションとフィールドに既定値があり、空のYAMLでも有効です。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    pub swarm: SwarmConfig,
    pub sensors: SensorProfiles,
    pub target: TargetConfig,
    pub reporting_unit: ReportingUnitConfig,
    pub guidance: GuidanceConfig,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 目標の初期位置（未指定なら右端中央）
    pub fn target_position(&self) -> Vec2 {
        self.target.position.map(Vec2::from).unwrap_or_else(|| {
            Vec2::new(
                f64::from(self.world.width) - 1.0,
                (f64::from(self.world.height) / 2.0).floor(),
            )
        })
    }

    /// ミサイルの発射位置（未指定なら左端中央）
    pub fn launch_position(&self) -> Vec2 {
        self.swarm
            .launch_position
            .map(Vec2::from)
            .unwrap_or_else(|| Vec2::new(0.0, (f64::from(self.world.height) / 2.0).floor()))
    }

    /// TRUの配置位置（未指定なら目標の65セル手前、同じ高さ）
    pub fn reporting_unit_position(&self) -> Vec2 {
        self.reporting_unit.position.map(Vec2::from).unwrap_or_else(|| {
            let target = self.target_position();
            Vec2::new((target.x - 65.0).max(0.0), target.y)
        })
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.world.width == 0 || self.world.height == 0 {
            return Err(ScenarioError::ValidationError("world width/height must be positive".to_string()));
        }
        if self.sim.max_ticks == 0 {
            return Err(ScenarioError::ValidationError("max_ticks must be positive".to_string()));
        }

        // 非有限値（NaN・無限大）の検出
        if let Some((name, value)) = self.numeric_fields().into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ScenarioError::ValidationError(format!("{} must be finite: {}", name, value)));
        }

        // 速度の検証
        let swarm = &self.swarm;
        if !(swarm.min_speed > 0.0 && swarm.min_speed <= swarm.max_speed) {
            return Err(ScenarioError::ValidationError(format!(
                "invalid speed range: min {} max {}",
                swarm.min_speed, swarm.max_speed
            )));
        }
        if swarm.base_speed < swarm.min_speed || swarm.base_speed > swarm.max_speed {
            return Err(ScenarioError::ValidationError(format!(
                "base_speed {} outside [{}, {}]",
                swarm.base_speed, swarm.min_speed, swarm.max_speed
            )));
        }
        if swarm.fuel == 0 {
            return Err(ScenarioError::ValidationError("fuel must be positive".to_string()));
        }
        if swarm.comms_range < 0.0 {
            return Err(ScenarioError::ValidationError("comms_range must be non-negative".to_string()));
        }
        if !(0.0..=1.0).contains(&swarm.scout_fraction) {
            return Err(ScenarioError::ValidationError(format!(
                "scout_fraction {} outside [0, 1]",
                swarm.scout_fraction
            )));
        }
        if swarm.wave_size == 0 {
            return Err(ScenarioError::ValidationError("wave_size must be positive".to_string()));
        }

        // センサーの検証
        for (role, sensor) in [
            ("attacker", &self.sensors.attacker),
            ("scout", &self.sensors.scout),
            ("reporting_unit", &self.sensors.reporting_unit),
        ] {
            if sensor.range < 0.0 || sensor.noise_std < 0.0 {
                return Err(ScenarioError::ValidationError(format!(
                    "sensor {} has negative range or noise",
                    role
                )));
            }
            if !(0.0..=360.0).contains(&sensor.field_of_view_deg) {
                return Err(ScenarioError::ValidationError(format!(
                    "sensor {} field_of_view_deg {} outside [0, 360]",
                    role, sensor.field_of_view_deg
                )));
            }
        }

        // 目標の検証
        if self.target.phase_min_ticks == 0 || self.target.phase_min_ticks > self.target.phase_max_ticks {
            return Err(ScenarioError::ValidationError(format!(
                "invalid target phase range: {}..={}",
                self.target.phase_min_ticks, self.target.phase_max_ticks
            )));
        }
        let target = self.target_position();
        if !self.is_position_in_bounds(target) {
            return Err(ScenarioError::ValidationError(format!("target position {} outside world", target)));
        }
        let launch = self.launch_position();
        if !self.is_position_in_bounds(launch) {
            return Err(ScenarioError::ValidationError(format!("launch position {} outside world", launch)));
        }

        // TRUの検証
        if self.reporting_unit.update_interval == 0 {
            return Err(ScenarioError::ValidationError("update_interval must be positive".to_string()));
        }
        let heading = self.reporting_unit.heading;
        if heading.x == 0.0 && heading.y == 0.0 {
            return Err(ScenarioError::ValidationError("reporting_unit heading must be non-zero".to_string()));
        }

        // 誘導パラメータの検証
        let guidance = &self.guidance;
        if !(guidance.epsilon > 0.0) || guidance.perturbation < 0.0 || guidance.scout_lateral_spread < 0.0 {
            return Err(ScenarioError::ValidationError(
                "epsilon must be positive, perturbation and scout_lateral_spread non-negative".to_string(),
            ));
        }
        for (name, range) in [("decoy_divert_x", guidance.decoy_divert_x), ("decoy_divert_y", guidance.decoy_divert_y)] {
            if range[0] < 0.0 || range[0] > range[1] {
                return Err(ScenarioError::ValidationError(format!(
                    "{} must satisfy 0 <= min <= max: {:?}",
                    name, range
                )));
            }
        }

        Ok(())
    }

    /// 検証対象の実数フィールド一覧
    fn numeric_fields(&self) -> Vec<(&'static str, f64)> {
        let swarm = &self.swarm;
        let sensors = &self.sensors;
        let guidance = &self.guidance;
        let mut fields = vec![
            ("swarm.base_speed", swarm.base_speed),
            ("swarm.min_speed", swarm.min_speed),
            ("swarm.max_speed", swarm.max_speed),
            ("swarm.comms_range", swarm.comms_range),
            ("swarm.scout_fraction", swarm.scout_fraction),
            ("sensors.attacker.range", sensors.attacker.range),
            ("sensors.attacker.field_of_view_deg", sensors.attacker.field_of_view_deg),
            ("sensors.attacker.noise_std", sensors.attacker.noise_std),
            ("sensors.scout.range", sensors.scout.range),
            ("sensors.scout.field_of_view_deg", sensors.scout.field_of_view_deg),
            ("sensors.scout.noise_std", sensors.scout.noise_std),
            ("sensors.reporting_unit.range", sensors.reporting_unit.range),
            ("sensors.reporting_unit.field_of_view_deg", sensors.reporting_unit.field_of_view_deg),
            ("sensors.reporting_unit.noise_std", sensors.reporting_unit.noise_std),
            ("target.speed", self.target.speed),
            ("reporting_unit.heading.x", self.reporting_unit.heading.x),
            ("reporting_unit.heading.y", self.reporting_unit.heading.y),
            ("guidance.epsilon", guidance.epsilon),
            ("guidance.perturbation", guidance.perturbation),
            ("guidance.sensor_switch_distance", guidance.sensor_switch_distance),
            ("guidance.final_assault_distance", guidance.final_assault_distance),
            ("guidance.loiter_buffer", guidance.loiter_buffer),
            ("guidance.loiter_speed_factor", guidance.loiter_speed_factor),
            ("guidance.wave_stagger_increment", guidance.wave_stagger_increment),
            ("guidance.scout_lateral_spread", guidance.scout_lateral_spread),
            ("guidance.terminal_distance", guidance.terminal_distance),
            ("guidance.approach_offset", guidance.approach_offset),
            ("guidance.cohesion_buffer", guidance.cohesion_buffer),
            ("guidance.decoy_diverge_distance", guidance.decoy_diverge_distance),
            ("guidance.decoy_self_destruct_distance", guidance.decoy_self_destruct_distance),
            ("guidance.decoy_divert_x[0]", guidance.decoy_divert_x[0]),
            ("guidance.decoy_divert_x[1]", guidance.decoy_divert_x[1]),
            ("guidance.decoy_divert_y[0]", guidance.decoy_divert_y[0]),
            ("guidance.decoy_divert_y[1]", guidance.decoy_divert_y[1]),
            ("guidance.policy_turn_rad", guidance.policy_turn_rad),
            ("guidance.policy_speed_step", guidance.policy_speed_step),
        ];
        if let Some(estimate) = swarm.initial_estimate {
            fields.push(("swarm.initial_estimate.x", estimate.x));
            fields.push(("swarm.initial_estimate.y", estimate.y));
        }
        fields
    }

    /// 位置がワールド内かどうかをチェック
    fn is_position_in_bounds(&self, position: Vec2) -> bool {
        position.is_finite()
            && position.x >= 0.0
            && position.x <= f64::from(self.world.width) - 1.0
            && position.y >= 0.0
            && position.y <= f64::from(self.world.height) - 1.0
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("最大ティック数: {}", self.sim.max_ticks);
        match self.sim.seed {
            Some(seed) => println!("シード値: {}", seed),
            None => println!("シード値: (ランダム)"),
        }
        println!(
            "グリッド: {}×{} ({:?})",
            self.world.width, self.world.height, self.world.topology
        );
        println!();

        println!("=== スウォーム ===");
        println!("モード: {}", self.swarm.mode);
        println!("総発射数: {}発 (間隔 {}ティック)", self.swarm.missile_count, self.swarm.launch_interval);
        if self.swarm.mode == SwarmMode::ReconLed {
            println!("スカウト: {}機", self.swarm.scout_quota());
        }
        if self.swarm.mode == SwarmMode::PulseWave {
            println!("ウェーブ規模: {}機", self.swarm.wave_size);
        }
        println!(
            "速度: 基準 {:.2} / 最小 {:.2} / 最大 {:.2}",
            self.swarm.base_speed, self.swarm.min_speed, self.swarm.max_speed
        );
        println!("燃料: {}ティック, 通信距離: {:.1}", self.swarm.fuel, self.swarm.comms_range);
        println!();

        println!("=== 目標・TRU ===");
        println!("目標初期位置: {}", self.target_position());
        println!("TRU位置: {} (周期 {}ティック)", self.reporting_unit_position(), self.reporting_unit.update_interval);
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = ScenarioConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.world.width, 250);
        assert_eq!(config.world.height, 60);
        assert_eq!(config.swarm.mode, SwarmMode::Independent);
        assert_eq!(config.target_position(), Vec2::new(249.0, 30.0));
        assert_eq!(config.launch_position(), Vec2::new(0.0, 30.0));
        assert_eq!(config.reporting_unit_position(), Vec2::new(184.0, 30.0));
    }

    #[test]
    fn test_from_file_parses_partial_scenario() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
meta:
  name: recon test
sim:
  max_ticks: 200
  seed: 42
world:
  width: 120
  height: 40
  topology: toroidal
swarm:
  mode: RECCE
  missile_count: 10
"#
        )
        .unwrap();

        let config = ScenarioConfig::from_file(file.path()).unwrap();
        assert_eq!(config.meta.name, "recon test");
        assert_eq!(config.sim.seed, Some(42));
        assert_eq!(config.world.topology, Topology::Toroidal);
        assert_eq!(config.swarm.mode, SwarmMode::ReconLed);
        assert_eq!(config.swarm.scout_quota(), 3);
        // 未指定のフィールドは既定値
        assert_eq!(config.swarm.fuel, 400);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = ScenarioConfig::from_file("/nonexistent/scenario.yaml").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "swarm: [not, a, map").unwrap();
        let err = ScenarioConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ScenarioError::ParseError(_, _)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ScenarioConfig::default();
        config.swarm.min_speed = 3.0;
        assert!(matches!(config.validate(), Err(ScenarioError::ValidationError(_))));

        let mut config = ScenarioConfig::default();
        config.target.position = Some(Position2D { x: 500.0, y: 10.0 });
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.target.phase_min_ticks = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_finite_values() {
        let err = ScenarioConfig::from_yaml_str("swarm:\n  base_speed: .nan").unwrap_err();
        assert!(matches!(err, ScenarioError::ValidationError(ref msg) if msg.contains("swarm.base_speed")));

        let err = ScenarioConfig::from_yaml_str("guidance:\n  decoy_divert_x: [.nan, .nan]").unwrap_err();
        assert!(matches!(err, ScenarioError::ValidationError(ref msg) if msg.contains("decoy_divert_x")));

        let err = ScenarioConfig::from_yaml_str("guidance:\n  decoy_divert_y: [50.0, .inf]").unwrap_err();
        assert!(matches!(err, ScenarioError::ValidationError(_)));

        let mut config = ScenarioConfig::default();
        config.sensors.scout.noise_std = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.guidance.terminal_distance = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = ScenarioConfig::default();
        config.swarm.comms_range = f64::NEG_INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bundled_scenarios_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
        for (file, mode) in [
            ("default.yaml", SwarmMode::Independent),
            ("recon_led.yaml", SwarmMode::ReconLed),
            ("pulse_wave.yaml", SwarmMode::PulseWave),
            ("multi_axis_toroidal.yaml", SwarmMode::MultiAxis),
        ] {
            let config = ScenarioConfig::from_file(dir.join(file)).unwrap();
            assert_eq!(config.swarm.mode, mode, "{file}");
        }
    }

    #[test]
    fn test_scout_quota_is_at_least_one() {
        let mut swarm = SwarmConfig::default();
        swarm.missile_count = 2;
        swarm.scout_fraction = 0.1;
        assert_eq!(swarm.scout_quota(), 1);

        swarm.missile_count = 0;
        assert_eq!(swarm.scout_quota(), 0);

        swarm.missile_count = 20;
        swarm.scout_fraction = 0.3;
        assert_eq!(swarm.scout_quota(), 6);
    }
}
