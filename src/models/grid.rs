use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::models::common::{AgentId, GridCell, Vec2};

/// グリッド境界の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// 境界でクランプ（非トーラス）
    #[default]
    Clamped,
    /// 境界でラップ（トーラス）
    Toroidal,
}

/// シミュレーション空間の離散グリッド
///
/// 連続座標を格子セルに変換します。占有状態は [`OccupancyIndex`] が持ちます。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub width: i64,
    pub height: i64,
    pub topology: Topology,
}

impl Grid {
    pub fn new(width: u32, height: u32, topology: Topology) -> Self {
        Self {
            width: i64::from(width.max(1)),
            height: i64::from(height.max(1)),
            topology,
        }
    }

    /// 連続座標をセルに変換（四捨五入後、トポロジーに従いクランプまたはラップ）
    pub fn to_cell(&self, position: Vec2) -> GridCell {
        let x = position.x.round() as i64;
        let y = position.y.round() as i64;
        match self.topology {
            Topology::Clamped => GridCell::new(
                x.clamp(0, self.width - 1),
                y.clamp(0, self.height - 1),
            ),
            Topology::Toroidal => GridCell::new(
                x.rem_euclid(self.width),
                y.rem_euclid(self.height),
            ),
        }
    }

    /// 座標がグリッド範囲内（セル中心基準）かどうか
    pub fn contains(&self, position: Vec2) -> bool {
        position.x >= 0.0 && position.x <= (self.width - 1) as f64 &&
        position.y >= 0.0 && position.y <= (self.height - 1) as f64
    }

    /// 連続座標をトポロジーに従いグリッド内に収める
    pub fn confine(&self, position: Vec2) -> Vec2 {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        match self.topology {
            Topology::Clamped => Vec2::new(position.x.clamp(0.0, max_x), position.y.clamp(0.0, max_y)),
            Topology::Toroidal => Vec2::new(
                position.x.rem_euclid(self.width as f64),
                position.y.rem_euclid(self.height as f64),
            ),
        }
    }

    /// Y座標をグリッドの縦範囲に収める
    pub fn clamp_y(&self, y: f64) -> f64 {
        y.clamp(0.0, (self.height - 1) as f64)
    }
}

/// セル単位の空間占有インデックス
///
/// 1セルに複数のエージェントが同時に存在することを許容します（排他なし）。
#[derive(Debug, Default, Clone)]
pub struct OccupancyIndex {
    cells: HashMap<GridCell, Vec<AgentId>>,
    locations: HashMap<AgentId, GridCell>,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// エージェントをセルに配置（既に配置済みなら移動）
    pub fn place(&mut self, id: AgentId, cell: GridCell) {
        self.remove(id);
        self.cells.entry(cell).or_default().push(id);
        self.locations.insert(id, cell);
    }

    /// エージェントを新しいセルへ移動
    pub fn move_to(&mut self, id: AgentId, cell: GridCell) {
        if self.locations.get(&id) == Some(&cell) {
            return;
        }
        self.place(id, cell);
    }

    /// エージェントを占有インデックスから除去
    pub fn remove(&mut self, id: AgentId) {
        if let Some(old) = self.locations.remove(&id) {
            if let Some(ids) = self.cells.get_mut(&old) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.cells.remove(&old);
                }
            }
        }
    }

    /// セル内のエージェントID一覧
    pub fn occupants(&self, cell: GridCell) -> &[AgentId] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell_of(&self, id: AgentId) -> Option<GridCell> {
        self.locations.get(&id).copied()
    }

    pub fn contains(&self, id: AgentId) -> bool {
        self.locations.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
