//! Zooplankton abundance charts for the Delaware Bay, Raritan Bay and Ross Sea surveys
use std::path::{Path, PathBuf};

use itertools::Itertools;
use ndarray::Array2;
use plotters::style::RGBColor;
use tracing::{info, warn};

use crate::config::Settings;
use crate::plot::{
    cycle, tab20, BarChart, BarSeries, StackedBarChart, DARK_GREEN, DARK_ORANGE, FIREBRICK, GRAY,
    INDIGO, MAIZE, MEDIUM_SEA_GREEN, PURE_RED, PURPLE, STEEL_BLUE,
};
use crate::table::Table;
use crate::workbook::Workbook;
use crate::Result;

pub const ABUNDANCE_COLUMN: &str = "abundance_count_per_m3";
pub const PERCENT_COLUMN: &str = "percent_abundance";
const DISPLAY_COLUMN: &str = "species_display";

const STATION_LABELS: [(&str, &str); 3] = [
    ("outside_front", "Outside Front"),
    ("inside_front", "Inside Front"),
    ("marine", "Marine"),
];
const STATION_COLOURS: [RGBColor; 3] = [STEEL_BLUE, MEDIUM_SEA_GREEN, PURPLE];

/// Species of the Ross Sea tows, bottom layer first
pub const ROSS_SEA_SPECIES: [(&str, RGBColor); 8] = [
    ("E. crystallorophias adult", PURE_RED),
    ("E. crystallorophias juveniles", FIREBRICK),
    ("T. macrura", DARK_ORANGE),
    ("Copepods", MAIZE),
    ("Amphipods", DARK_GREEN),
    ("Pteropods", STEEL_BLUE),
    ("P. antarctica adult/juvenile", INDIGO),
    ("P. antarctica larvae", GRAY),
];

/// Species of the Ross Sea grazing tows, bottom layer first
pub const GRAZING_SPECIES: [(&str, RGBColor); 6] = [
    ("E. crystallorophias adult", FIREBRICK),
    ("T. macrura", DARK_ORANGE),
    ("Amphipods", DARK_GREEN),
    ("Pteropods", STEEL_BLUE),
    ("P. antarctica adult/juvenile", INDIGO),
    ("P. antarctica larvae", GRAY),
];

const ROSS_SEA_Y_RANGE: (f64, f64) = (0.0, 1950.0);
const RARITAN_TITLE: &str = "Spring 2019 Copepods";
const ATONSA_TITLE: &str = "Fall 2019 - Acartia tonsa";

fn per_m3() -> String {
    "Zooplankton abundance (ind m⁻³)".to_owned()
}

/// Display name of a species: copepods become "G. species"
///
/// ```
/// # use zooplankton_tools::abundance::shorten_species;
/// assert_eq!(shorten_species("Acartia tonsa", "Copepod - Calanoid"), "A. tonsa");
/// assert_eq!(shorten_species("Acartia tonsa", "Other"), "Acartia tonsa");
/// ```
pub fn shorten_species(species: &str, kind: &str) -> String {
    if !kind.contains("Copepod") {
        return species.to_owned();
    }
    let mut words = species.split_whitespace();
    match (words.next().and_then(|genus| genus.chars().next()), words.next()) {
        (Some(initial), Some(epithet)) => format!("{initial}. {epithet}"),
        _ => species.to_owned(),
    }
}

/// Add the `species_display` column from `species` and `type`
pub fn add_species_display(table: &mut Table) -> Result<()> {
    let species = table.column_index("species")?;
    let kind = table.column_index("type")?;
    let display = table
        .rows()
        .map(|row| shorten_species(row.text(species), row.text(kind)))
        .collect();
    table.set_column(DISPLAY_COLUMN, display);
    Ok(())
}

/// Rows that are not of type `Other`
fn copepods(table: &Table) -> Result<Table> {
    let kind = table.column_index("type")?;
    Ok(table.filter(|row| row.text(kind) != "Other"))
}

/// Distinct non-blank values of a column in order of first appearance
fn appearance_order(table: &Table, name: &str) -> Result<Vec<String>> {
    let column = table.column_index(name)?;
    Ok(table
        .rows()
        .map(|row| row.text(column))
        .filter(|value| !value.is_empty())
        .unique()
        .map(str::to_owned)
        .collect())
}

/// `categories × groups` matrix of `value` summed over matching rows, NaN where nothing matched
pub fn category_matrix(
    table: &Table,
    (category, group, value): (&str, &str, &str),
    categories: &[String],
    groups: &[String],
) -> Result<Array2<f64>> {
    let category_column = table.column_index(category)?;
    let group_column = table.column_index(group)?;
    let value_column = table.column_index(value)?;

    let mut matrix = Array2::from_elem((categories.len(), groups.len()), f64::NAN);
    for row in table.rows() {
        let i = categories.iter().position(|c| c == row.text(category_column));
        let j = groups.iter().position(|g| g == row.text(group_column));
        let number = row.number(value_column);
        if let (Some(i), Some(j)) = (i, j) {
            if number.is_nan() {
                continue;
            }
            let cell = &mut matrix[[i, j]];
            *cell = if cell.is_nan() { number } else { *cell + number };
        }
    }
    Ok(matrix)
}

/// Copepod abundance per species, one bar per station
pub fn de_bay_chart(table: &Table, settings: &Settings) -> Result<BarChart> {
    let mut table = copepods(table)?;
    add_species_display(&mut table)?;

    let stations = &settings.abundance.stations;
    let first = stations
        .first()
        .map_or_else(|| Ok(table.clone()), |station| table.select("station", station))?;
    let species = appearance_order(&first, DISPLAY_COLUMN)?;
    let values = category_matrix(
        &table,
        ("station", DISPLAY_COLUMN, ABUNDANCE_COLUMN),
        stations,
        &species,
    )?;

    let series = stations
        .iter()
        .zip(values.rows())
        .enumerate()
        .map(|(i, (station, row))| BarSeries {
            label: settings.label(station, &STATION_LABELS),
            colour: STATION_COLOURS
                .get(i)
                .copied()
                .unwrap_or_else(|| cycle(i)),
            values: row.to_vec(),
            errors: None,
        })
        .collect();

    let mut chart = BarChart::new(species, series);
    chart.title = Some(settings.abundance.title.clone());
    chart.y_desc = per_m3();
    chart.bar_width = 0.25;
    chart.opacity = 0.8;
    Ok(chart)
}

fn stacked(table: &Table, group: &str, category: &str, categories: Vec<String>) -> Result<StackedBarChart> {
    let groups = table.unique(group)?;
    let values = category_matrix(table, (category, group, ABUNDANCE_COLUMN), &categories, &groups)?;
    let mut chart = StackedBarChart::new(groups, categories, values);
    chart.y_desc = per_m3();
    Ok(chart)
}

/// Stacked charts by station: every copepod species, copepod types, and *A. tonsa* alone
pub fn raritan_charts(table: &Table) -> Result<Vec<(&'static str, StackedBarChart)>> {
    let mut table = table.clone();
    table.sort_by_column("CS")?;
    add_species_display(&mut table)?;
    let copes = copepods(&table)?;

    let species = copes.unique(DISPLAY_COLUMN)?;
    let colours = tab20(species.len());
    let mut by_species = stacked(&copes, "CS", DISPLAY_COLUMN, species)?;
    by_species.colours = colours;
    by_species.title = Some(RARITAN_TITLE.to_owned());

    let types = copes.group_sum(&["CS", "type"], &[ABUNDANCE_COLUMN])?;
    let mut by_type = stacked(&types, "CS", "type", copes.unique("type")?)?;
    by_type.title = Some(RARITAN_TITLE.to_owned());

    let atonsa = table.select(DISPLAY_COLUMN, "A. tonsa")?;
    let mut by_atonsa = stacked(&atonsa, "CS", DISPLAY_COLUMN, atonsa.unique(DISPLAY_COLUMN)?)?;
    by_atonsa.title = Some(ATONSA_TITLE.to_owned());

    Ok(vec![
        ("zooplankton_abundance1.png", by_species),
        ("zooplankton_abundance2.png", by_type),
        ("zooplankton_abundance_atonsa.png", by_atonsa),
    ])
}

/// Stacked chart of fixed species per tow, tows in sheet order
fn tow_chart(long: &Table, value: &str, species: &[(&str, RGBColor)]) -> Result<StackedBarChart> {
    let tows = appearance_order(long, "Tow")?;
    let categories = species.iter().map(|(name, _)| (*name).to_owned()).collect::<Vec<_>>();
    let values = category_matrix(long, ("Species", "Tow", value), &categories, &tows)?;

    let bar_width = if tows.len() > 3 { 0.6 } else { 0.5 };
    let mut chart = StackedBarChart::new(tows, categories, values);
    chart.colours = species.iter().map(|(_, colour)| *colour).collect();
    chart.bar_width = bar_width;
    chart.opacity = 0.8;
    chart.reverse_legend = true;
    Ok(chart)
}

/// Per sampling period, all tows and the tows kept for the biomass comparison
pub fn ross_sea_charts(abundance: &Table, key: &Table) -> Result<Vec<(String, StackedBarChart)>> {
    let long = abundance
        .melt("Tow", "Species", ABUNDANCE_COLUMN)?
        .merge_outer(key, "Tow")?;

    let periods = long
        .unique("Period")?
        .into_iter()
        .filter(|period| !period.contains("no_period"));

    let mut charts = Vec::new();
    for period in periods {
        let tows = long.select("Period", &period)?;
        let mut all = tow_chart(&tows, ABUNDANCE_COLUMN, &ROSS_SEA_SPECIES)?;
        all.y_desc = "Abundance (ind m⁻²)".to_owned();
        all.y_range = Some(ROSS_SEA_Y_RANGE);
        charts.push((format!("{period}_zoop_abundance.png"), all));

        let compared = tows.select("Comparison", "yes")?;
        if compared.is_empty() {
            warn!(period, "no tows marked for the biomass comparison");
            continue;
        }
        let mut subset = tow_chart(&compared, ABUNDANCE_COLUMN, &ROSS_SEA_SPECIES)?;
        subset.y_desc = "Abundance (ind m⁻²)".to_owned();
        subset.y_range = Some(ROSS_SEA_Y_RANGE);
        charts.push((format!("{period}_zoop_abundance_biomasscompare.png"), subset));
    }
    Ok(charts)
}

/// Stacked chart of one grazing-tow sheet, absolute or percent abundance
pub fn grazing_chart(sheet: &str, table: &Table) -> Result<StackedBarChart> {
    let (value, y_desc) = if sheet == PERCENT_COLUMN {
        (PERCENT_COLUMN, "Percent Abundance (%)".to_owned())
    } else {
        (ABUNDANCE_COLUMN, "Abundance (ind m⁻³)".to_owned())
    };
    let long = table.melt("Tow", "Species", value)?;
    let mut chart = tow_chart(&long, value, &GRAZING_SPECIES)?;
    chart.y_desc = y_desc;
    Ok(chart)
}

fn size(settings: &Settings) -> (u32, u32) {
    (settings.figure.width, settings.figure.height)
}

/// Grouped and broken-axis copepod charts into `<dir>/figures`
pub fn run_de_bay(path: &Path, output_dir: Option<&Path>, settings: &Settings) -> Result<Vec<PathBuf>> {
    let workbook = Workbook::open(path)?;
    let chart = de_bay_chart(&workbook.sheet("abundance")?, settings)?;
    let figures = output_dir
        .unwrap_or_else(|| workbook.location())
        .join("figures");

    let plain = figures.join("zooplankton_abundance.png");
    chart.draw(&plain, size(settings))?;
    let broken = figures.join("zooplankton_abundance_brokenaxis.png");
    chart.draw_broken(&broken, size(settings), settings.abundance.broken_axis)?;
    Ok(vec![plain, broken])
}

/// Stacked station charts next to the workbook
pub fn run_raritan(path: &Path, output_dir: Option<&Path>, settings: &Settings) -> Result<Vec<PathBuf>> {
    let workbook = Workbook::open(path)?;
    let base = output_dir.unwrap_or_else(|| workbook.location()).to_path_buf();
    raritan_charts(&workbook.sheet("abundance")?)?
        .into_iter()
        .map(|(name, chart)| {
            let figure = base.join(name);
            chart.draw(&figure, size(settings))?;
            Ok(figure)
        })
        .collect()
}

/// Per-period tow charts into `<dir>/zooplankton_figs`
pub fn run_ross_sea(path: &Path, output_dir: Option<&Path>, settings: &Settings) -> Result<Vec<PathBuf>> {
    let workbook = Workbook::open(path)?;
    let base = output_dir
        .unwrap_or_else(|| workbook.location())
        .join("zooplankton_figs");
    let charts = ross_sea_charts(&workbook.sheet("abundance")?, &workbook.sheet("key")?)?;
    info!(charts = charts.len(), "drawing Ross Sea tows");
    charts
        .into_iter()
        .map(|(name, chart)| {
            let figure = base.join(name);
            chart.draw(&figure, size(settings))?;
            Ok(figure)
        })
        .collect()
}

/// One chart per abundance sheet into `figs` beside the workbook's directory
pub fn run_ross_sea_grazing(
    path: &Path,
    output_dir: Option<&Path>,
    settings: &Settings,
) -> Result<Vec<PathBuf>> {
    let workbook = Workbook::open(path)?;
    let base = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => workbook
            .location()
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("figs"),
    };
    [ABUNDANCE_COLUMN, PERCENT_COLUMN]
        .into_iter()
        .map(|value| {
            let sheet = if value == ABUNDANCE_COLUMN { "abundance" } else { value };
            let chart = grazing_chart(sheet, &workbook.sheet(sheet)?)?;
            let figure = base.join(format!("zoop_{sheet}.png"));
            chart.draw(&figure, size(settings))?;
            Ok(figure)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        category_matrix, de_bay_chart, grazing_chart, raritan_charts, ross_sea_charts,
        shorten_species,
    };
    use crate::config::Settings;
    use crate::plot::{tab20, MEDIUM_SEA_GREEN};
    use crate::table::Table;

    fn table(csv: &str) -> Table {
        Table::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn only_copepods_are_shortened() {
        assert_eq!(shorten_species("Centropages hamatus", "Copepod"), "C. hamatus");
        assert_eq!(shorten_species("Polychaete larvae", "Other"), "Polychaete larvae");
        assert_eq!(shorten_species("Harpacticoida", "Copepod"), "Harpacticoida");
    }

    #[test]
    fn matrix_sums_duplicates_and_leaves_gaps() {
        let t = table("k,g,v\na,x,1\na,x,2\nb,y,5\n");
        let m = category_matrix(
            &t,
            ("k", "g", "v"),
            &["a".to_owned(), "b".to_owned()],
            &["x".to_owned(), "y".to_owned()],
        )
        .unwrap();
        approx::assert_relative_eq!(m[[0, 0]], 3.0);
        approx::assert_relative_eq!(m[[1, 1]], 5.0);
        assert!(m[[0, 1]].is_nan());
    }

    #[test]
    fn de_bay_groups_stations_by_species() {
        let t = table(
            "station,type,species,abundance_count_per_m3
outside_front,Copepod,Acartia tonsa,100
outside_front,Copepod,Centropages hamatus,20
outside_front,Other,Polychaete larvae,5
inside_front,Copepod,Acartia tonsa,1050
inside_front,Copepod,Centropages hamatus,30
marine,Copepod,Centropages hamatus,40
",
        );
        let chart = de_bay_chart(&t, &Settings::default()).unwrap();
        assert_eq!(chart.categories, ["A. tonsa", "C. hamatus"]);
        assert_eq!(chart.series.len(), 3);
        assert_eq!(chart.series[1].label, "Inside Front");
        assert_eq!(chart.series[1].colour, MEDIUM_SEA_GREEN);
        assert_eq!(chart.series[1].values, [1050.0, 30.0]);
        assert!(chart.series[2].values[0].is_nan());
        approx::assert_relative_eq!(chart.bar_width, 0.25);
    }

    #[test]
    fn raritan_charts_stack_by_station() {
        let t = table(
            "CS,type,species,abundance_count_per_m3
RB2,Copepod - Calanoid,Acartia tonsa,7
RB1,Copepod - Calanoid,Acartia tonsa,3
RB1,Copepod - Cyclopoid,Oithona similis,2
RB2,Copepod - Calanoid,Eurytemora affinis,1
RB1,Other,Polychaete larvae,9
",
        );
        let charts = raritan_charts(&t).unwrap();
        assert_eq!(charts.len(), 3);

        let (name, species) = &charts[0];
        assert_eq!(*name, "zooplankton_abundance1.png");
        assert_eq!(species.groups, ["RB1", "RB2"]);
        assert_eq!(species.categories, ["A. tonsa", "E. affinis", "O. similis"]);
        assert_eq!(species.colours, tab20(3));

        let types = &charts[1].1;
        assert_eq!(types.categories, ["Copepod - Calanoid", "Copepod - Cyclopoid"]);
        approx::assert_relative_eq!(types.values[[0, 1]], 8.0);

        let atonsa = &charts[2].1;
        assert_eq!(atonsa.categories, ["A. tonsa"]);
        assert_eq!(atonsa.values.row(0).to_vec(), [3.0, 7.0]);
    }

    #[test]
    fn ross_sea_charts_follow_the_period_key() {
        let abundance = table(
            "Tow,Copepods,T. macrura
12,100,5
3,50,
7,20,1
",
        );
        let key = table(
            "Tow,Period,Comparison
12,early,yes
3,early,no
7,no_period,no
",
        );
        let charts = ross_sea_charts(&abundance, &key).unwrap();
        let names = charts.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            ["early_zoop_abundance.png", "early_zoop_abundance_biomasscompare.png"]
        );

        let all = &charts[0].1;
        assert_eq!(all.groups, ["12", "3"]);
        assert_eq!(all.categories.len(), 8);
        approx::assert_relative_eq!(all.bar_width, 0.5);
        assert_eq!(all.y_range, Some((0.0, 1950.0)));
        assert!(all.reverse_legend);
        approx::assert_relative_eq!(all.values[[3, 0]], 100.0);
        assert!(all.values[[2, 1]].is_nan());

        assert_eq!(charts[1].1.groups, ["12"]);
    }

    #[test]
    fn grazing_charts_label_the_metric() {
        let t = table("Tow,Amphipods,Pteropods\n1,10,20\n2,30,40\n");
        let chart = grazing_chart("abundance", &t).unwrap();
        assert_eq!(chart.y_desc, "Abundance (ind m⁻³)");
        approx::assert_relative_eq!(chart.values[[2, 1]], 30.0);

        let percent = grazing_chart("percent_abundance", &t).unwrap();
        assert_eq!(percent.y_desc, "Percent Abundance (%)");
        assert_eq!(percent.categories.len(), 6);
    }
}
