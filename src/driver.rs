//! 自動再生ドライバ
//!
//! `tokio` のタイマーで一定周期ごとにティックを1つずつ進めます。
//! 一時停止・停止は [`PlaybackHandle`] から `watch` チャネル経由で指示し、
//! ティックの途中で中断されることはありません。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use crate::simulation::{RunSummary, SimulationEngine};
use crate::snapshot::SimulationSnapshot;

/// 再生状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Stop,
}

/// 再生制御ハンドル
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    sender: Arc<watch::Sender<PlaybackCommand>>,
}

impl PlaybackHandle {
    pub fn play(&self) {
        self.sender.send_replace(PlaybackCommand::Play);
    }

    pub fn pause(&self) {
        self.sender.send_replace(PlaybackCommand::Pause);
    }

    pub fn stop(&self) {
        self.sender.send_replace(PlaybackCommand::Stop);
    }

    pub fn current(&self) -> PlaybackCommand {
        *self.sender.borrow()
    }
}

/// 自動再生ドライバ
#[derive(Debug)]
pub struct AutoPlayDriver {
    period: Duration,
    control: watch::Receiver<PlaybackCommand>,
}

impl AutoPlayDriver {
    /// 新しいドライバと制御ハンドルを作成
    ///
    /// # 引数
    ///
    /// * `period` - ティック周期
    pub fn new(period: Duration) -> (Self, PlaybackHandle) {
        let (sender, control) = watch::channel(PlaybackCommand::Play);
        let period = period.max(Duration::from_millis(1));
        (Self { period, control }, PlaybackHandle { sender: Arc::new(sender) })
    }

    /// 完了または停止指示まで再生
    ///
    /// # 引数
    ///
    /// * `engine` - 初期化済みのエンジン
    /// * `on_tick` - 各ティック後に呼ばれるスナップショットのコールバック
    ///
    /// # 戻り値
    ///
    /// 再生終了時点の集計
    pub async fn run<F>(mut self, engine: &mut SimulationEngine, mut on_tick: F) -> RunSummary
    where
        F: FnMut(&SimulationSnapshot),
    {
        info!(period_ms = self.period.as_millis() as u64, "AUTOPLAY_STARTED: 自動再生を開始します");

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut control_open = true;

        while !engine.is_finished() {
            let command = *self.control.borrow_and_update();
            match command {
                PlaybackCommand::Stop => break,
                PlaybackCommand::Pause => {
                    // 再開できる送信側がいなければ終了
                    if !control_open || self.control.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                PlaybackCommand::Play => {}
            }

            if control_open {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.step();
                        on_tick(&engine.snapshot());
                    }
                    changed = self.control.changed() => {
                        if changed.is_err() {
                            control_open = false;
                        }
                        let current = *self.control.borrow();
                        debug!(command = ?current, "AUTOPLAY_CONTROL: 再生状態が変更されました");
                    }
                }
            } else {
                ticker.tick().await;
                engine.step();
                on_tick(&engine.snapshot());
            }
        }

        let summary = engine.summary();
        info!(ticks = summary.ticks, finished = engine.is_finished(), "AUTOPLAY_STOPPED: 自動再生を終了しました");
        summary
    }
}
