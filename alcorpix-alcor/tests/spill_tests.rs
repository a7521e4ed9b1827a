use alcorpix_alcor::{Spill, SpillSegmenter};
use alcorpix_core::{HitRecord, RawRecord, RecordBatch, RecordType};

// Helper to build a raw table row for an ALCOR hit
fn hit_row(channel: i32, coarse: i32) -> RawRecord {
    RawRecord {
        record_type: RecordType::ALCOR_HIT_CODE,
        column: channel / 4,
        pixel: channel % 4,
        coarse,
        ..RawRecord::default()
    }
}

fn marker_row(code: i32) -> RawRecord {
    RawRecord {
        record_type: code,
        ..RawRecord::default()
    }
}

fn start_row() -> RawRecord {
    marker_row(RecordType::START_SPILL_CODE)
}

fn end_row() -> RawRecord {
    marker_row(RecordType::END_SPILL_CODE)
}

fn segment(rows: Vec<RawRecord>, channel: u32) -> Vec<Spill> {
    let batch: RecordBatch = rows.into_iter().collect();
    let records = batch.channel_records(channel).unwrap();
    SpillSegmenter::new(records, channel).collect()
}

fn coarse_values(spill: &Spill) -> Vec<i64> {
    spill.hits.iter().map(HitRecord::raw_coarse).collect()
}

#[test]
fn test_hits_before_first_start_are_never_emitted() {
    let spills = segment(
        vec![hit_row(0, 1), hit_row(0, 2), start_row(), hit_row(0, 3), end_row()],
        0,
    );
    assert_eq!(spills.len(), 1);
    assert_eq!(coarse_values(&spills[0]), vec![3]);
}

#[test]
fn test_unterminated_final_spill_is_dropped() {
    let spills = segment(
        vec![
            start_row(),
            hit_row(0, 10),
            end_row(),
            start_row(),
            hit_row(0, 20),
            hit_row(0, 30),
        ],
        0,
    );
    assert_eq!(spills.len(), 1);
    assert_eq!(coarse_values(&spills[0]), vec![10]);
}

#[test]
fn test_restart_discards_partial_spill() {
    let spills = segment(
        vec![
            start_row(),
            hit_row(0, 10),
            start_row(),
            hit_row(0, 20),
            end_row(),
        ],
        0,
    );
    assert_eq!(spills.len(), 1);
    assert_eq!(coarse_values(&spills[0]), vec![20]);
}

#[test]
fn test_hits_between_spills_are_ignored() {
    let spills = segment(
        vec![
            start_row(),
            hit_row(0, 10),
            end_row(),
            hit_row(0, 15),
            start_row(),
            hit_row(0, 20),
            end_row(),
        ],
        0,
    );
    assert_eq!(spills.len(), 2);
    assert_eq!(spills[0].index, 0);
    assert_eq!(spills[1].index, 1);
    assert_eq!(coarse_values(&spills[1]), vec![20]);
}

#[test]
fn test_stray_end_marker_advances_index() {
    let spills = segment(
        vec![
            end_row(),
            start_row(),
            hit_row(0, 10),
            end_row(),
        ],
        0,
    );
    assert_eq!(spills.len(), 1);
    assert_eq!(spills[0].index, 1);
}

#[test]
fn test_empty_spill_is_still_emitted() {
    let spills = segment(vec![start_row(), hit_row(1, 10), end_row()], 0);
    assert_eq!(spills.len(), 1);
    assert!(spills[0].hits.is_empty());
}

#[test]
fn test_filtered_count_matches_channel_hits() {
    let mut rows = vec![start_row()];
    for i in 0..40 {
        rows.push(hit_row(i % 8, i * 10));
        if i % 5 == 0 {
            rows.push(marker_row(RecordType::TRIGGER_TAG_CODE));
        }
    }
    rows.push(end_row());

    let spills = segment(rows, 3);
    let total: usize = spills.iter().map(|s| s.hits.len()).sum();
    assert_eq!(total, 5);
    assert!(spills[0].hits.iter().all(|h| h.channel() == 3));
}

#[test]
fn test_foreign_rows_leave_spills_unchanged() {
    let clean = vec![
        start_row(),
        hit_row(2, 10),
        hit_row(2, 330),
        end_row(),
        start_row(),
        hit_row(2, 650),
        end_row(),
    ];

    let mut noisy = Vec::new();
    for (i, row) in clean.iter().enumerate() {
        noisy.push(*row);
        if i == 1 {
            // unlisted type code with garbage payload
            noisy.push(RawRecord {
                record_type: 3,
                tdc: -1,
                coarse: -7,
                ..RawRecord::default()
            });
            // malformed hit on another channel
            noisy.push(RawRecord {
                tdc: 6,
                rollover: -2,
                ..hit_row(5, 20)
            });
        }
    }

    assert_eq!(segment(noisy, 2), segment(clean, 2));
}
