use parking_lot::Mutex;

/// Sends each record to the partition that has received the fewest bytes
/// from this balancer so far. Ties go to the lowest partition number.
pub struct LeastBytes {
    sent: Mutex<Vec<u64>>,
}

impl LeastBytes {
    pub fn new(partitions: usize) -> Self {
        Self {
            sent: Mutex::new(vec![0; partitions]),
        }
    }

    pub fn partitions(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions() == 0
    }

    /// Switches to `partitions` partitions and forgets the bytes sent so far.
    pub fn resize(&self, partitions: usize) {
        let mut sent = self.sent.lock();
        if sent.len() != partitions {
            *sent = vec![0; partitions];
        }
    }

    /// Picks a partition and charges `bytes` to it. Returns None when the
    /// partition count is unknown, leaving the choice to the client.
    pub fn pick(&self, bytes: usize) -> Option<i32> {
        let mut sent = self.sent.lock();
        let (partition, load) = sent
            .iter_mut()
            .enumerate()
            .min_by_key(|(partition, load)| (**load, *partition))?;
        *load += bytes as u64;
        i32::try_from(partition).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_least_loaded_partition() {
        let balancer = LeastBytes::new(3);

        assert_eq!(balancer.pick(100), Some(0));
        assert_eq!(balancer.pick(10), Some(1));
        assert_eq!(balancer.pick(10), Some(2));
        // 1 and 2 are tied at 10 bytes
        assert_eq!(balancer.pick(50), Some(1));
        assert_eq!(balancer.pick(1), Some(2));
        assert_eq!(balancer.pick(1), Some(2));
    }

    #[test]
    fn test_no_partitions() {
        let balancer = LeastBytes::new(0);
        assert!(balancer.is_empty());
        assert_eq!(balancer.pick(100), None);
    }

    #[test]
    fn test_resize_starts_balancing() {
        let balancer = LeastBytes::new(0);
        balancer.resize(2);

        assert_eq!(balancer.partitions(), 2);
        assert_eq!(balancer.pick(5), Some(0));
        assert_eq!(balancer.pick(5), Some(1));

        // Same size keeps the counters
        balancer.resize(2);
        assert_eq!(balancer.pick(1), Some(0));
    }
}
