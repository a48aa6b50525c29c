use gridsight::config::GridConfig;
use gridsight::{
    Cube, CubeClass, DedupMode, EdgeMode, GridDecoder, GridError, GridVariant, ReplayEngine, Scanner, Tensor,
    parse_features,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// 4x4 网格、三通道输出，对应 32x32 输入
    fn class_ab_output(hits: &[(usize, usize, usize, f32)]) -> Tensor {
        let mut values = vec![0.0f32; 4 * 4 * 3];
        for &(row, col, channel, v) in hits {
            values[(row * 4 + col) * 3 + channel] = v;
        }
        Tensor::float(&[1, 4, 4, 3], values).unwrap()
    }

    fn features(frame_size: usize, value: f32) -> String {
        vec![value.to_string(); frame_size].join(",")
    }

    #[test]
    fn class_ab_run_from_config() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("frame.bmp");
        let config = GridConfig::from_toml_str(&format!(
            r#"
            [model]
            input_dims = [1, 32, 32, 1]

            [decode]
            variant = "class_ab"

            [render]
            output = "{}"

            [report]
            color = false
            "#,
            output.display()
        ))?;

        let scanner = Scanner::from_config(&config);
        assert_eq!(scanner.frame_size(), 1024);

        // A 类优先于 B 类；三通道默认不去重，相邻结果都保留
        let mut engine = ReplayEngine::new(
            Tensor::zeros(&config.model.input_dims, None),
            class_ab_output(&[(0, 0, 1, 0.7), (0, 0, 2, 0.9), (0, 1, 1, 0.6), (3, 3, 2, 0.5)]),
        );
        let features = parse_features(&features(1024, 0.0))?;
        let mut out = Vec::new();
        let outcome = scanner.run(&mut engine, &features, &mut out)?;

        assert_eq!(
            outcome.cubes,
            vec![
                Cube::new(0, 0, 0.7, CubeClass::ClassA),
                Cube::new(0, 1, 0.6, CubeClass::ClassA),
                Cube::new(3, 3, 0.5, CubeClass::ClassB),
            ]
        );

        let text = String::from_utf8(out)?;
        assert!(text.contains("Image resolution: 32x32"));
        assert!(text.contains("Found 3 cube(s):"));
        assert!(!text.contains('\x1b'));

        let bitmap = image::open(&output)?.to_rgb8();
        assert_eq!(bitmap.dimensions(), (32, 32));
        assert_eq!(bitmap.get_pixel(3, 3).0, [0xFF, 0, 0]);
        assert_eq!(bitmap.get_pixel(12, 4).0, [0xFF, 0, 0]);
        assert_eq!(bitmap.get_pixel(31, 31).0, [0, 0xFF, 0]);
        assert_eq!(bitmap.get_pixel(20, 4).0, [0, 0, 0]);
        Ok(())
    }

    #[test]
    fn binary_greedy_keeps_first_in_scan_order() {
        let mut values = vec![0.0f32; 3 * 3 * 2];
        // (0, 1) 置信度较低但先被扫描到
        values[(0 * 3 + 1) * 2 + 1] = 0.4;
        values[(1 * 3 + 1) * 2 + 1] = 0.95;
        values[(2 * 3 + 2) * 2 + 1] = 0.31;
        let tensor = Tensor::float(&[1, 3, 3, 2], values).unwrap();

        let greedy = GridDecoder::new(GridVariant::Binary).decode(&tensor).unwrap();
        assert_eq!(greedy.iter().map(|c| (c.row, c.col)).collect::<Vec<_>>(), vec![(0, 1), (2, 2)]);

        let ranked = GridDecoder::new(GridVariant::Binary)
            .with_dedup(DedupMode::Ranked)
            .decode(&tensor)
            .unwrap();
        assert_eq!(ranked.iter().map(|c| (c.row, c.col)).collect::<Vec<_>>(), vec![(1, 1)]);
    }

    #[test]
    fn cubes_on_the_edge_are_clipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.bmp");
        // 20x20 输入，3x3 网格：最后一列/行的方块只剩 4 个像素宽
        let mut values = vec![0.0f32; 3 * 3 * 2];
        values[(2 * 3 + 2) * 2 + 1] = 0.9;
        let mut engine = ReplayEngine::new(
            Tensor::zeros(&[1, 20, 20, 1], None),
            Tensor::float(&[1, 3, 3, 2], values).unwrap(),
        );
        let scanner = Scanner::new(400, GridDecoder::new(GridVariant::Binary))
            .with_edge_mode(EdgeMode::Clip)
            .with_output_path(&path);

        let features = parse_features(&features(400, 1.0)).unwrap();
        scanner.run(&mut engine, &features, &mut Vec::new()).unwrap();

        let bitmap = image::open(&path).unwrap().to_rgb8();
        assert_eq!(bitmap.get_pixel(19, 19).0, [0xFF, 0, 0]);
        assert_eq!(bitmap.get_pixel(16, 16).0, [0xFF, 0, 0]);
        assert_eq!(bitmap.get_pixel(15, 15).0, [0xFF, 0xFF, 0xFF]);
        // 裁剪模式不会绕到下一行的开头
        assert_eq!(bitmap.get_pixel(0, 19).0, [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn bad_feature_token_is_reported_with_index() {
        let err = parse_features("0.1, 0.2, nope, 0.4").unwrap_err();
        match err {
            GridError::Parse { index, token } => {
                assert_eq!(index, 2);
                assert_eq!(token, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn wrong_feature_count_leaves_no_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.bmp");
        let mut engine = ReplayEngine::new(Tensor::zeros(&[1, 32, 32, 1], None), class_ab_output(&[]));
        let scanner = Scanner::new(1024, GridDecoder::new(GridVariant::ClassAb)).with_output_path(&path);

        let features = parse_features(&features(1000, 0.5)).unwrap();
        let err = scanner.run(&mut engine, &features, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, GridError::SizeMismatch { expected: 1024, actual: 1000 }));
        assert!(!path.exists());
        assert_eq!(engine.invocations(), 0);
    }
}
