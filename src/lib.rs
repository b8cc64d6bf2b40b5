//! スウォーム型徘徊ミサイルによる移動目標迎撃のエージェントベースシミュレーション
//!
//! 離散グリッド上で、スクリプト移動する目標・目標報告ユニット（TRU）・
//! 複数の戦術モードで協調するミサイル群を固定順序のティックで進めます。

pub mod models;
pub mod scenario;
pub mod simulation;
pub mod snapshot;
pub mod driver;
pub mod logging;
