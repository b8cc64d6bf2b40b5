use serde::Serialize;
use tracing::trace;
use crate::models::{
    common::{AgentId, TargetEstimate, Vec2},
    guidance::MissileRole,
};

/// ミサイル間メッセージ
///
/// 送信ティックの自機状態の不変スナップショットで、受信側ではそのティックの
/// 誘導計算にのみ有効です。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Message {
    pub sender_id: AgentId,
    pub position: Vec2,
    pub target_estimate: TargetEstimate,
    pub speed: f64,
    pub fuel: u32,
    pub wave_id: u32,
    pub role: MissileRole,
}

/// 通信の送信元情報（送信可能距離を含む）
#[derive(Debug, Clone, Copy)]
pub struct Broadcast {
    pub message: Message,
    pub comms_range: f64,
}

/// 1ティック分の通信統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommsStats {
    pub senders: usize,
    pub deliveries: usize,
}

/// 通信層
///
/// トポロジーを保持せず、毎ティック全ての順序対（送信元, 受信先）について
/// `距離 <= 送信元の通信距離` のときだけ配信します。
#[derive(Debug, Default)]
pub struct CommunicationLayer {
    last_stats: CommsStats,
    total_deliveries: u64,
}

impl CommunicationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// メッセージ交換
    ///
    /// # 引数
    ///
    /// * `broadcasts` - 生存ミサイル全機の送信情報
    ///
    /// # 戻り値
    ///
    /// `broadcasts` と同じ順序の受信箱。自分自身のメッセージは含まれません。
    pub fn exchange(&mut self, broadcasts: &[Broadcast]) -> Vec<Vec<Message>> {
        let mut inboxes: Vec<Vec<Message>> = vec![Vec::new(); broadcasts.len()];
        let mut deliveries = 0usize;

        for sender in broadcasts {
            for (receiver, inbox) in broadcasts.iter().zip(inboxes.iter_mut()) {
                if sender.message.sender_id == receiver.message.sender_id {
                    continue;
                }
                let distance = sender.message.position.distance(&receiver.message.position);
                if distance <= sender.comms_range {
                    inbox.push(sender.message);
                    deliveries += 1;
                }
            }
        }

        self.last_stats = CommsStats {
            senders: broadcasts.len(),
            deliveries,
        };
        self.total_deliveries += deliveries as u64;

        trace!(
            senders = broadcasts.len(),
            deliveries,
            "COMMS_EXCHANGE: メッセージを交換しました"
        );

        inboxes
    }

    pub fn last_stats(&self) -> CommsStats {
        self.last_stats
    }

    pub fn total_deliveries(&self) -> u64 {
        self.total_deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast(id: AgentId, x: f64, comms_range: f64) -> Broadcast {
        Broadcast {
            message: Message {
                sender_id: id,
                position: Vec2::new(x, 0.0),
                target_estimate: TargetEstimate::Unknown,
                speed: 1.0,
                fuel: 10,
                wave_id: 0,
                role: MissileRole::Attacker,
            },
            comms_range,
        }
    }

    #[test]
    fn test_delivery_uses_sender_range() {
        let mut layer = CommunicationLayer::new();
        // 1 → 2 は届く（距離40 ≤ 50）、2 → 1 は届かない（距離40 > 10）
        let broadcasts = [broadcast(1, 0.0, 50.0), broadcast(2, 40.0, 10.0)];

        let inboxes = layer.exchange(&broadcasts);
        assert!(inboxes[0].is_empty());
        assert_eq!(inboxes[1].len(), 1);
        assert_eq!(inboxes[1][0].sender_id, 1);
        assert_eq!(layer.last_stats(), CommsStats { senders: 2, deliveries: 1 });
    }

    #[test]
    fn test_no_self_delivery_and_boundary_inclusive() {
        let mut layer = CommunicationLayer::new();
        let broadcasts = [broadcast(1, 0.0, 50.0), broadcast(2, 50.0, 50.0), broadcast(3, 101.0, 50.0)];

        let inboxes = layer.exchange(&broadcasts);
        assert_eq!(inboxes[0].iter().map(|m| m.sender_id).collect::<Vec<_>>(), vec![2]);
        assert_eq!(inboxes[1].iter().map(|m| m.sender_id).collect::<Vec<_>>(), vec![1]);
        assert!(inboxes[2].is_empty());
        assert_eq!(layer.total_deliveries(), 2);
    }

    #[test]
    fn test_exchange_is_stateless_between_ticks() {
        let mut layer = CommunicationLayer::new();
        let inboxes = layer.exchange(&[broadcast(1, 0.0, 50.0), broadcast(2, 10.0, 50.0)]);
        assert_eq!(inboxes[1].len(), 1);

        // 翌ティックに送信元がいなければ何も届かない
        let inboxes = layer.exchange(&[broadcast(2, 10.0, 50.0)]);
        assert!(inboxes[0].is_empty());
    }
}
