//! Exact `(name, url)` deduplication of canonical records.

use std::collections::HashSet;

use iptvscan_protocol::ChannelRecord;

/// Drop records whose `(name, url)` pair was already seen, keeping first occurrences in order.
pub fn dedup_records<I>(records: I) -> Vec<ChannelRecord>
where
    I: IntoIterator<Item = ChannelRecord>,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pairs_collapse() {
        let input = vec![
            ChannelRecord::new("CCTV1", "http://a/1.m3u8"),
            ChannelRecord::new("CCTV1", "http://b/1.m3u8"),
            ChannelRecord::new("CCTV1", "http://a/1.m3u8"),
            ChannelRecord::new("CCTV2", "http://a/1.m3u8"),
        ];
        let output = dedup_records(input.clone());

        assert_eq!(
            output,
            vec![
                ChannelRecord::new("CCTV1", "http://a/1.m3u8"),
                ChannelRecord::new("CCTV1", "http://b/1.m3u8"),
                ChannelRecord::new("CCTV2", "http://a/1.m3u8"),
            ]
        );
        assert!(output.len() <= input.len());
        assert!(output.iter().all(|r| input.contains(r)));
    }

    #[test]
    fn test_output_is_unique() {
        let input: Vec<_> = (0..50)
            .map(|i| ChannelRecord::new(format!("CH{}", i % 7), format!("http://h/{}", i % 5)))
            .collect();
        let output = dedup_records(input.clone());

        let unique: HashSet<_> = output.iter().collect();
        assert_eq!(unique.len(), output.len());
        assert_eq!(output.len(), 35);
        assert!(output.iter().all(|r| input.contains(r)));
    }

    #[test]
    fn test_empty() {
        assert!(dedup_records(Vec::new()).is_empty());
    }
}
