mod support;

use std::sync::Arc;

use shortlist_rs::test_support::{generate_shortlists, populate};
use shortlist_rs::{construct_handler, KeyedTable, LabelId, Mode, RowSlot, ShortlistMethod, TableBackend};
use support::{handler_config, NUM_LABELS, WIDTH};
use tempfile::tempdir;

#[test]
fn test_save_load_round_trip_both_backends() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let data = generate_shortlists(64, WIDTH, NUM_LABELS, 5, 0.6, 7);

    for build_in_memory in [true, false] {
        let fname = format!("build_{build_in_memory}");
        let config = handler_config(ShortlistMethod::Static, dir.path(), Mode::Train, build_in_memory);
        let mut builder = construct_handler(&config, None)?;
        populate(builder.as_mut(), &data, &fname)?;
        builder.save_shortlist(&fname)?;

        for load_in_memory in [true, false] {
            let config =
                handler_config(ShortlistMethod::Static, dir.path(), Mode::Test, load_in_memory);
            let mut reader = construct_handler(&config, None)?;
            assert!(!reader.is_initialized());
            reader.load_shortlist(&fname)?;
            assert!(reader.is_initialized());
            assert_eq!(reader.num_instances(), Some(data.instances.len()));

            for (index, instance) in data.instances.iter().enumerate() {
                assert_eq!(reader.query(index)?, instance.shortlist);
            }
        }
    }
    Ok(())
}

#[test]
fn test_backends_emit_identical_shortlists() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let data = generate_shortlists(32, WIDTH, NUM_LABELS, 20, 0.8, 11);

    for mode in [Mode::Train, Mode::Test] {
        let mut memory =
            construct_handler(&handler_config(ShortlistMethod::Static, dir.path(), mode, true), None)?;
        let mut mapped =
            construct_handler(&handler_config(ShortlistMethod::Static, dir.path(), mode, false), None)?;
        populate(memory.as_mut(), &data, "memory")?;
        populate(mapped.as_mut(), &data, "mapped")?;

        for (index, instance) in data.instances.iter().enumerate() {
            let positives = Some(instance.positives.as_slice());
            assert_eq!(
                memory.get_shortlist(index, positives)?,
                mapped.get_shortlist(index, positives)?
            );
        }
    }
    Ok(())
}

#[test]
fn test_widened_handlers_keep_static_prefix() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let data = generate_shortlists(16, WIDTH, NUM_LABELS, 3, 0.5, 3);

    let mut plain =
        construct_handler(&handler_config(ShortlistMethod::Static, dir.path(), Mode::Test, true), None)?;
    populate(plain.as_mut(), &data, "shared")?;
    plain.save_shortlist("shared")?;

    let injected: Vec<Vec<LabelId>> = (0..data.instances.len())
        .map(|i| (0..6).map(|j| (i * 6 + j) as LabelId).collect())
        .collect();

    for method in [ShortlistMethod::Hybrid, ShortlistMethod::Extended] {
        let config = handler_config(method, dir.path(), Mode::Test, false);
        let mut widened = construct_handler(&config, None)?;
        widened.load_shortlist("shared")?;
        if method == ShortlistMethod::Extended {
            widened.update_dynamic(Arc::new(injected.clone()))?;
        }
        assert_eq!(widened.size_shortlist(), WIDTH + config.corruption);

        for index in 0..data.instances.len() {
            let expected = plain.query(index)?;
            let raw = widened.query(index)?;
            assert_eq!(raw.len(), WIDTH + config.corruption);
            assert_eq!(&raw.labels[..WIDTH], expected.labels.as_slice());
            assert_eq!(&raw.sim[..WIDTH], expected.sim.as_slice());
            if method == ShortlistMethod::Extended {
                assert_eq!(&raw.labels[WIDTH..], injected[index].as_slice());
            }
        }
    }
    Ok(())
}

#[test]
fn test_extended_accepts_table_as_dynamic_source() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let config = handler_config(ShortlistMethod::Extended, dir.path(), Mode::Train, true);
    let mut handler = construct_handler(&config, None)?;
    let labels: Vec<LabelId> = (0..16).collect();
    handler.update_shortlist(&labels, &[0.5; 16], "tmp", RowSlot::Append)?;

    let mut mined = KeyedTable::<LabelId>::new(TableBackend::Memory);
    mined.create(&[100, 101, 102, 103, 104, 105], dir.path().join("mined"), RowSlot::Append)?;
    handler.update_dynamic(Arc::new(mined))?;

    let out = handler.get_shortlist(0, Some(&[3]))?;
    assert_eq!(out.width(), 22);
    assert_eq!(out.labels[0], 3);
    assert_eq!(out.num_positives(), 1);
    assert!(out.labels.contains(&105));
    Ok(())
}

#[test]
fn test_load_missing_artifact_fails() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let config = handler_config(ShortlistMethod::Static, dir.path(), Mode::Test, false);
    let mut handler = construct_handler(&config, None)?;
    assert!(handler.load_shortlist("never_saved").is_err());
    assert!(!handler.is_initialized());
    Ok(())
}

#[test]
fn test_short_and_empty_rows_build_on_both_backends() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let rows: Vec<Vec<LabelId>> = vec![vec![], vec![1, 2], vec![3, 4, 5], (10..26).collect()];
    let positives: &[LabelId] = &[4];

    let mut outputs = Vec::new();
    for in_memory in [true, false] {
        let fname = format!("short_{in_memory}");
        let config = handler_config(ShortlistMethod::Static, dir.path(), Mode::Test, in_memory);
        let mut handler = construct_handler(&config, None)?;
        for row in &rows {
            let sim = vec![0.5f32; row.len()];
            handler.update_shortlist(row, &sim, &fname, RowSlot::Append)?;
        }
        handler.save_shortlist(&fname)?;

        let mut reader = construct_handler(&config, None)?;
        reader.load_shortlist(&fname)?;
        let mut shortlists = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            assert_eq!(&reader.query(index)?.labels, row);
            shortlists.push(handler.get_shortlist(index, Some(positives))?);
        }
        outputs.push(shortlists);
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[0][0].labels, vec![NUM_LABELS as LabelId; WIDTH]);
    assert_eq!(outputs[0][2].labels_mask[1], 1.0);
    Ok(())
}
