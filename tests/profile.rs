use tpm_profile::matrix::build_expression_matrix;
use tpm_profile::profile::build_profile;
use tpm_profile::{FeatureFilter, SampleTable};

fn sample(key: &str, records: &[(&str, f64)]) -> SampleTable {
    SampleTable {
        sample_key: key.to_string(),
        records: records.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
    }
}

fn matrix() -> tpm_profile::ExpressionMatrix {
    build_expression_matrix(
        vec![
            sample("1ko_LL18_1", &[("AT1G01010.1", 1.0), ("AT1G01010.2", 2.0)]),
            sample("1ko_LL18_2", &[("AT1G01010.1", 3.0), ("AT1G01010.2", 2.0)]),
            sample("1ko_LL24_1", &[("AT1G01010.1", 5.0)]),
            sample("1ox_LL18_1", &[("AT1G01010.1", 7.0), ("AT1G01020.1", 1.0)]),
        ],
        &FeatureFilter::default(),
    )
}

#[test]
fn one_series_per_feature_and_genotype() {
    let profile = build_profile(&matrix(), "AT1G01010");
    assert_eq!(profile.title, "Expression Profile: AT1G01010");
    assert!(profile.message.is_none());
    // AT1G01010.1, AT1G01010.2 and the gene row, each split over 1ko and 1ox.
    assert_eq!(profile.series.len(), 6);

    let legend: Vec<&str> = profile
        .series
        .iter()
        .filter(|s| s.show_in_legend)
        .map(|s| s.feature_id.as_str())
        .collect();
    assert_eq!(legend, vec!["AT1G01010.1", "AT1G01010.2", "AT1G01010"]);

    let first = &profile.series[0];
    assert_eq!(first.genotype, "1ko");
    assert_eq!(first.x, vec![1.0, 1.5]);
    assert_eq!(first.mean, vec![2.0, 5.0]);
    assert!((first.std[0] - 2.0_f64.sqrt()).abs() < 1e-12);
    assert!(first.std[1].is_nan());

    let second = &profile.series[1];
    assert_eq!(second.genotype, "1ox");
    assert_eq!(second.x, vec![2.25]);
    assert_eq!(first.color, second.color);
}

#[test]
fn ticks_follow_sample_group_order() {
    let profile = build_profile(&matrix(), "AT1G01010");
    let ticks: Vec<(f64, &str)> = profile.ticks.iter().map(|(x, g)| (*x, g.as_str())).collect();
    assert_eq!(
        ticks,
        vec![(1.0, "1ko_LL18"), (1.5, "1ko_LL24"), (2.25, "1ox_LL18")]
    );
}

#[test]
fn unknown_gene_yields_message_instead_of_series() {
    let profile = build_profile(&matrix(), "AT5G99999");
    assert!(profile.is_empty());
    assert_eq!(
        profile.message.as_deref(),
        Some("No expression data found for AT5G99999")
    );

    let blank = build_profile(&matrix(), "");
    assert_eq!(blank.message.as_deref(), Some("No data to display"));
}
