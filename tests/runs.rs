use std::path::{Path, PathBuf};

use tempdir::TempDir;

use zooplankton_tools::config::Settings;
use zooplankton_tools::ingestion::{self, IngestionOptions, IngestionOutputs, TimeSource};
use zooplankton_tools::table::Table;
use zooplankton_tools::{abundance, grazing_stats, krill, sinking};

const CHLA: &str = "Cruise,Station,Bottle,Time Point,Chl (ug/l),expt_vol_ml,num_copes
Fall2019,inside_front,control1,t0,2.0,500,0
Fall2019,inside_front,control1,tf,2.4,500,0
Fall2019,inside_front,treatment1,tf,1.6,500,10
Fall2019,inside_front,treatment2,tf,1.7,500,10
Fall2019,outside_front,control1,t0,2.0,500,0
Fall2019,outside_front,control1,tf,2.5,500,0
Fall2019,outside_front,treatment1,tf,0.4,500,10
Fall2019,outside_front,treatment2,tf,0.45,500,10
";

const TIMES: &str = "cruise,station,bottle,expt_time_hours
Fall2019,inside_front,control1,24
Fall2019,inside_front,treatment1,24
Fall2019,inside_front,treatment2,24.5
Fall2019,outside_front,control1,24
Fall2019,outside_front,treatment1,23.5
Fall2019,outside_front,treatment2,24
";

/// Writes each sheet as `<dir>/<name>.csv` and returns `dir`
fn write_sheets(dir: &Path, sheets: &[(&str, &str)]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    for (name, contents) in sheets {
        std::fs::write(dir.join(format!("{name}.csv")), contents).unwrap();
    }
    dir.to_path_buf()
}

fn written(paths: &[PathBuf]) {
    for path in paths {
        let len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        assert!(len > 0, "{} was not written", path.display());
    }
}

fn options(times: TimeSource, output_dir: Option<PathBuf>) -> IngestionOptions {
    IngestionOptions {
        experiment: "expt1".to_owned(),
        prefix: "DEBay_MP".to_owned(),
        times,
        output_dir,
    }
}

#[test]
fn ingestion_writes_beside_a_directory_workbook() {
    let tmp_dir = TempDir::new("ingestion_directory").unwrap();
    let book = write_sheets(
        &tmp_dir.path().join("DEBay_MP_expt1"),
        &[("chla", CHLA), ("expt_data", TIMES)],
    );

    let outputs = ingestion::run(&book, &options(TimeSource::Workbook, None), &Settings::default()).unwrap();
    assert_eq!(
        outputs,
        IngestionOutputs {
            summary: tmp_dir.path().join("DEBay_MP_expt1_chla_ingest_rates_summary.csv"),
            figure: tmp_dir.path().join("figures").join("Chla_ingest_rates_expt1.png"),
        }
    );
    written(&[outputs.summary.clone(), outputs.figure]);
    assert_eq!(Table::from_path(&outputs.summary).unwrap().headers(), ingestion::SUMMARY_HEADERS);
}

#[test]
fn ingestion_reads_an_excel_workbook() {
    let tmp_dir = TempDir::new("ingestion_xlsx").unwrap();
    let book = tmp_dir.path().join("DEBay_MP_expt1.xlsx");
    std::fs::copy(
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/DEBay_MP_expt1.xlsx"),
        &book,
    )
    .unwrap();

    let outputs = ingestion::run(&book, &options(TimeSource::Workbook, None), &Settings::default()).unwrap();
    assert_eq!(
        outputs.summary,
        tmp_dir.path().join("DEBay_MP_expt1_chla_ingest_rates_summary.csv")
    );
    written(&[outputs.summary.clone(), outputs.figure]);

    // Two bottles per station plus one control average each, then the aggregate block
    let summary = Table::from_path(&outputs.summary).unwrap();
    assert_eq!(summary.len(), 2 * 3 + 2 + 2);
}

#[test]
fn ingestion_with_a_times_csv_uses_its_own_names() {
    let tmp_dir = TempDir::new("ingestion_times_csv").unwrap();
    let chla = tmp_dir.path().join("DEBay_MP_chla.csv");
    let times = tmp_dir.path().join("expt_times.csv");
    std::fs::write(&chla, CHLA).unwrap();
    std::fs::write(&times, TIMES).unwrap();

    let outputs = ingestion::run(&chla, &options(TimeSource::Csv(times), None), &Settings::default()).unwrap();
    assert_eq!(outputs.summary, tmp_dir.path().join("DEBay_MP_expt1_ingest_rates.csv"));
    assert_eq!(outputs.figure, tmp_dir.path().join("figures").join("ingest_rates_expt1.png"));
    written(&[outputs.summary, outputs.figure]);
}

#[test]
fn ingestion_honours_the_output_directory() {
    let tmp_dir = TempDir::new("ingestion_output_dir").unwrap();
    let book = write_sheets(
        &tmp_dir.path().join("data").join("DEBay_MP_expt1"),
        &[("chla", CHLA), ("expt_data", TIMES)],
    );
    let out = tmp_dir.path().join("results");

    let outputs = ingestion::run(
        &book,
        &options(TimeSource::Workbook, Some(out.clone())),
        &Settings::default(),
    )
    .unwrap();
    assert_eq!(outputs.summary, out.join("DEBay_MP_expt1_chla_ingest_rates_summary.csv"));
    assert_eq!(outputs.figure, out.join("figures").join("Chla_ingest_rates_expt1.png"));
    written(&[outputs.summary, outputs.figure]);
    assert!(!tmp_dir.path().join("data").join("figures").exists());
}

const SINKING: &str = "cruise,station,sinking_rate_m_day
Fall2019,algae,10
Fall2019,algae,20
Fall2019,algae,30
Fall2019,algae_plastic,40
Fall2019,algae_plastic,50
Fall2019,algae_plastic,65
";

#[test]
fn sinking_names_one_figure_per_experiment() {
    let tmp_dir = TempDir::new("sinking_single").unwrap();
    let file = tmp_dir.path().join("DEBay_MP_expt1_FP.csv");
    std::fs::write(&file, SINKING).unwrap();

    let (csv, figures) = sinking::run(&file, "expt1", None, &Settings::default()).unwrap();
    assert_eq!(csv, tmp_dir.path().join("FP_sinking_rates_expt1_summary.csv"));
    assert_eq!(figures, [tmp_dir.path().join("figures").join("FP_sinking_rates_expt1.png")]);
    written(&figures);
    assert_eq!(Table::from_path(&csv).unwrap().headers(), sinking::SUMMARY_HEADERS);
}

#[test]
fn sinking_names_figures_per_cruise_when_several() {
    let tmp_dir = TempDir::new("sinking_cruises").unwrap();
    let file = tmp_dir.path().join("FP.csv");
    let spring = SINKING.lines().skip(1).map(|line| line.replace("Fall2019", "Spring2020"));
    let contents = SINKING
        .lines()
        .map(str::to_owned)
        .chain(spring)
        .collect::<Vec<_>>()
        .join("\n");
    std::fs::write(&file, contents).unwrap();
    let out = tmp_dir.path().join("out");

    let (csv, figures) = sinking::run(&file, "expt2", Some(&out), &Settings::default()).unwrap();
    assert_eq!(csv, out.join("FP_sinking_rates_expt2_summary.csv"));
    assert_eq!(
        figures,
        [
            out.join("figures").join("FP_sinking_rates_expt2_Fall2019.png"),
            out.join("figures").join("FP_sinking_rates_expt2_Spring2020.png"),
        ]
    );
    written(&figures);
    assert_eq!(Table::from_path(&csv).unwrap().len(), 4);
}

const KRILL_LENGTHS: &str = "Expt1,Expt2,Expt3
30.1,31.2,40.3
29.4,30.8,41.0
31.0,29.9,39.2
30.6,31.5,40.8
29.8,,39.9
";

#[test]
fn krill_figures_default_to_the_shared_figs_directory() {
    let tmp_dir = TempDir::new("krill_default").unwrap();
    let book = write_sheets(
        &tmp_dir.path().join("data").join("Krill_grazing_stats"),
        &[(krill::SHEET, KRILL_LENGTHS)],
    );

    let figures = krill::run(&book, None, &Settings::default()).unwrap();
    let dir = tmp_dir.path().join("figs").join("krill_length");
    assert_eq!(
        figures,
        [
            dir.join("hist_krill_length_Expt1_ranktransformed.png"),
            dir.join("hist_krill_length_Expt2_ranktransformed.png"),
            dir.join("hist_krill_length_Expt3_ranktransformed.png"),
            dir.join("hist_krill_length_ranktransformed.png"),
        ]
    );
    written(&figures);
}

#[test]
fn krill_figures_go_under_the_output_directory() {
    let tmp_dir = TempDir::new("krill_output_dir").unwrap();
    let book = write_sheets(
        &tmp_dir.path().join("data").join("Krill_grazing_stats"),
        &[(krill::SHEET, KRILL_LENGTHS)],
    );
    let out = tmp_dir.path().join("plots");

    let figures = krill::run(&book, Some(&out), &Settings::default()).unwrap();
    assert_eq!(figures.len(), 4);
    assert!(figures.iter().all(|f| f.parent() == Some(out.join("krill_length").as_path())));
    written(&figures);
    assert!(!tmp_dir.path().join("figs").exists());
}

#[test]
fn grazing_stats_draw_every_measure() {
    let tmp_dir = TempDir::new("grazing_stats_run").unwrap();
    let rates = "Experiment,Daily Individual Ingestion Rate,Community Ingestion Rate
Expt1,0.10,12
Expt1,0.14,15
Expt1,0.12,13
Expt2,0.52,40
Expt2,0.61,38
Expt2,0.55,44
";
    let book = write_sheets(
        &tmp_dir.path().join("data").join("Krill_grazing_stats"),
        &[(grazing_stats::SHEET, rates)],
    );

    let figures = grazing_stats::run(&book, None, &Settings::default()).unwrap();
    let dir = tmp_dir.path().join("figs");
    let mut expected = Vec::new();
    for slug in ["individual", "community"] {
        expected.push(dir.join(format!("hist_ingestion_rate_{slug}_Expt1.png")));
        expected.push(dir.join(format!("hist_ingestion_rate_{slug}_Expt2.png")));
        expected.push(dir.join(format!("ingestion_rate_{slug}.png")));
        expected.push(dir.join(format!("hist_ingestion_rate_{slug}_allexpts.png")));
    }
    assert_eq!(figures, expected);
    written(&figures);
}

#[test]
fn de_bay_abundance_writes_plain_and_broken_charts() {
    let tmp_dir = TempDir::new("abundance_de_bay").unwrap();
    let abundance = "station,type,species,abundance_count_per_m3
outside_front,Copepod,Acartia tonsa,100
outside_front,Copepod,Centropages hamatus,20
inside_front,Copepod,Acartia tonsa,1050
inside_front,Copepod,Centropages hamatus,30
marine,Copepod,Centropages hamatus,40
";
    let book = write_sheets(&tmp_dir.path().join("DEBay_abundance"), &[("abundance", abundance)]);

    let figures = abundance::run_de_bay(&book, None, &Settings::default()).unwrap();
    let dir = tmp_dir.path().join("figures");
    assert_eq!(
        figures,
        [
            dir.join("zooplankton_abundance.png"),
            dir.join("zooplankton_abundance_brokenaxis.png"),
        ]
    );
    written(&figures);
}

#[test]
fn raritan_abundance_writes_three_stacked_charts() {
    let tmp_dir = TempDir::new("abundance_raritan").unwrap();
    let abundance = "CS,type,species,abundance_count_per_m3
RB1,Copepod - Calanoid,Acartia tonsa,3
RB1,Copepod - Cyclopoid,Oithona similis,2
RB2,Copepod - Calanoid,Acartia tonsa,7
RB2,Copepod - Calanoid,Eurytemora affinis,1
";
    let book = write_sheets(&tmp_dir.path().join("RB_abundance"), &[("abundance", abundance)]);
    let out = tmp_dir.path().join("out");

    let figures = abundance::run_raritan(&book, Some(&out), &Settings::default()).unwrap();
    assert_eq!(
        figures,
        [
            out.join("zooplankton_abundance1.png"),
            out.join("zooplankton_abundance2.png"),
            out.join("zooplankton_abundance_atonsa.png"),
        ]
    );
    written(&figures);
}

#[test]
fn ross_sea_abundance_writes_per_period_charts() {
    let tmp_dir = TempDir::new("abundance_ross_sea").unwrap();
    let book = write_sheets(
        &tmp_dir.path().join("RossSea_abundance"),
        &[
            ("abundance", "Tow,Copepods,T. macrura\n12,100,5\n3,50,\n7,20,1\n"),
            ("key", "Tow,Period,Comparison\n12,early,yes\n3,early,no\n7,no_period,no\n"),
        ],
    );

    let figures = abundance::run_ross_sea(&book, None, &Settings::default()).unwrap();
    let dir = tmp_dir.path().join("zooplankton_figs");
    assert_eq!(
        figures,
        [
            dir.join("early_zoop_abundance.png"),
            dir.join("early_zoop_abundance_biomasscompare.png"),
        ]
    );
    written(&figures);
}

#[test]
fn ross_sea_grazing_abundance_writes_both_metrics() {
    let tmp_dir = TempDir::new("abundance_grazing").unwrap();
    let book = write_sheets(
        &tmp_dir.path().join("data").join("RossSea_grazing_abundance"),
        &[
            ("abundance", "Tow,Amphipods,Pteropods\n1,10,20\n2,30,40\n"),
            (abundance::PERCENT_COLUMN, "Tow,Amphipods,Pteropods\n1,33.3,66.7\n2,42.9,57.1\n"),
        ],
    );

    let figures = abundance::run_ross_sea_grazing(&book, None, &Settings::default()).unwrap();
    let dir = tmp_dir.path().join("figs");
    assert_eq!(
        figures,
        [
            dir.join("zoop_abundance.png"),
            dir.join("zoop_percent_abundance.png"),
        ]
    );
    written(&figures);
}
