//! Spreadsheet ingestion
//!
//! Turns an uploaded score sheet into upserts against a [`SurveyStore`]:
//!
//! 1. Every required column must be present; otherwise the import fails
//!    with one error naming all missing columns.
//! 2. Each row becomes three upserts (respondent, personality factors,
//!    categorization) keyed by the resolved respondent name.
//! 3. Rows without a name get `"Estudiante {n}"`, where `n` starts at the
//!    number of already stored respondents + 1 and only advances when a
//!    placeholder is actually used.
//!
//! The whole sheet is planned (and type-checked) before the first write,
//! so a bad cell in row 50 does not leave rows 1-49 behind.

pub mod table;

pub use table::{Cell, Table, TableRow, UploadFormat};

use crate::db::models::{
    Category, CategoryScores, NewRespondent, PersonalityFactor, PersonalityScores,
};
use crate::store::SurveyStore;
use thiserror::Error;
use tracing::{info, warn};

/// Prefix of synthesized respondent names
pub const PLACEHOLDER_NAME_PREFIX: &str = "Estudiante";

/// Respondent attribute columns, before the score columns
pub const IDENTITY_COLUMNS: [&str; 3] = ["name", "age", "gender"];

/// Import failures. None of them leaves partial writes behind when the
/// store runs inside a transaction.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File could not be read as CSV or workbook
    #[error("Unreadable spreadsheet: {0}")]
    Format(String),

    /// Required columns absent from the header row (all of them listed)
    #[error("Missing columns in spreadsheet: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Cell value of the wrong type
    #[error("Row {line}, column '{column}': {message}")]
    InvalidCell {
        line: usize,
        column: String,
        message: String,
    },

    /// Persistence failure while applying the plan
    #[error(transparent)]
    Store(#[from] crate::Error),
}

/// All required column names: identity, then factors, then categories
pub fn required_columns() -> Vec<&'static str> {
    IDENTITY_COLUMNS
        .iter()
        .copied()
        .chain(PersonalityFactor::ALL.iter().map(|f| f.code()))
        .chain(Category::ALL.iter().map(|c| c.code()))
        .collect()
}

/// Required columns absent from `table`, in required-column order
pub fn missing_columns(table: &Table) -> Vec<String> {
    required_columns()
        .into_iter()
        .filter(|c| table.column_index(c).is_none())
        .map(str::to_string)
        .collect()
}

/// Upper bound for a whole-number age cell; larger floats do not fit `i64`
const MAX_AGE_EXCLUSIVE: f64 = i64::MAX as f64;

/// Shared age rule for imports and direct writes: no negative ages
pub fn validate_age(age: i64) -> Result<i64, String> {
    if age < 0 {
        Err(format!("age must not be negative, got {age}"))
    } else {
        Ok(age)
    }
}

/// Map Spanish gender words to `M`/`F`.
///
/// Matching is case-insensitive and ignores surrounding whitespace;
/// anything else is returned untouched.
pub fn normalize_gender(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "masculino" => "M".to_string(),
        "femenino" => "F".to_string(),
        _ => raw.to_string(),
    }
}

/// The three upserts derived from one sheet row
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpserts {
    /// Source line in the sheet
    pub line: usize,
    pub respondent: NewRespondent,
    pub personality: PersonalityScores,
    pub categories: CategoryScores,
    /// Name was synthesized from the placeholder counter
    pub placeholder_name: bool,
}

/// Upserts for a whole sheet, in row order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportPlan {
    pub rows: Vec<RowUpserts>,
}

/// Outcome of an applied import
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportSummary {
    pub rows_processed: usize,
    pub placeholder_names: usize,
}

/// Column positions of the required fields in one particular sheet
struct ColumnMap {
    name: usize,
    age: usize,
    gender: usize,
    factors: Vec<(PersonalityFactor, usize)>,
    categories: Vec<(Category, usize)>,
}

impl ColumnMap {
    fn resolve(table: &Table) -> Result<Self, IngestError> {
        let missing = missing_columns(table);
        if !missing.is_empty() {
            return Err(IngestError::MissingColumns(missing));
        }

        // Presence was checked above
        let index = |name: &str| table.column_index(name).unwrap_or_default();
        Ok(Self {
            name: index("name"),
            age: index("age"),
            gender: index("gender"),
            factors: PersonalityFactor::ALL
                .iter()
                .map(|f| (*f, index(f.code())))
                .collect(),
            categories: Category::ALL
                .iter()
                .map(|c| (*c, index(c.code())))
                .collect(),
        })
    }
}

/// Validate and normalize a sheet into upserts without touching storage.
///
/// `current_count` is the number of respondents stored before the import;
/// placeholder names continue from it.
pub fn plan_import(table: &Table, current_count: i64) -> Result<ImportPlan, IngestError> {
    let columns = ColumnMap::resolve(table)?;
    let mut next_placeholder = current_count + 1;
    let mut rows = Vec::with_capacity(table.rows().len());

    for row in table.rows() {
        let (name, placeholder_name) = match cell_name(row.cell(columns.name)) {
            Some(name) => (name, false),
            None => {
                let name = format!("{PLACEHOLDER_NAME_PREFIX} {next_placeholder}");
                next_placeholder += 1;
                (name, true)
            }
        };

        let age = cell_age(row.cell(columns.age))
            .map_err(|message| invalid_cell(row, "age", message))?;
        let gender = cell_gender(row.cell(columns.gender))
            .map_err(|message| invalid_cell(row, "gender", message))?;

        let mut personality = PersonalityScores::default();
        for (factor, index) in &columns.factors {
            let value = cell_score(row.cell(*index))
                .map_err(|message| invalid_cell(row, factor.code(), message))?;
            personality.set(*factor, value);
        }

        let mut categories = CategoryScores::default();
        for (category, index) in &columns.categories {
            let value = cell_score(row.cell(*index))
                .map_err(|message| invalid_cell(row, category.code(), message))?;
            categories.set(*category, value);
        }

        rows.push(RowUpserts {
            line: row.line,
            respondent: NewRespondent { name, age, gender },
            personality,
            categories,
            placeholder_name,
        });
    }

    Ok(ImportPlan { rows })
}

/// Issue exactly three upserts per planned row, in row order
pub async fn apply_plan<S>(store: &mut S, plan: &ImportPlan) -> Result<ImportSummary, IngestError>
where
    S: SurveyStore + ?Sized,
{
    for row in &plan.rows {
        let respondent_id = store.upsert_respondent(&row.respondent).await?;
        store
            .upsert_personality_factors(respondent_id, &row.personality)
            .await?;
        store
            .upsert_categorization(respondent_id, &row.categories)
            .await?;
    }

    Ok(ImportSummary {
        rows_processed: plan.rows.len(),
        placeholder_names: plan.rows.iter().filter(|r| r.placeholder_name).count(),
    })
}

/// Plan `table` against the store's current respondent count, then apply it
pub async fn import_table<S>(store: &mut S, table: &Table) -> Result<ImportSummary, IngestError>
where
    S: SurveyStore + ?Sized,
{
    let current_count = store.count_respondents().await?;

    let plan = match plan_import(table, current_count) {
        Ok(plan) => plan,
        Err(e) => {
            warn!(error = %e, "Spreadsheet rejected");
            return Err(e);
        }
    };

    let summary = apply_plan(store, &plan).await?;
    info!(
        rows = summary.rows_processed,
        placeholder_names = summary.placeholder_names,
        "Spreadsheet imported"
    );
    Ok(summary)
}

fn invalid_cell(row: &TableRow, column: &str, message: String) -> IngestError {
    IngestError::InvalidCell {
        line: row.line,
        column: column.to_string(),
        message,
    }
}

/// `None` means the name must be synthesized
fn cell_name(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) => Some(format_number(*n)),
        Cell::Bool(b) => Some(b.to_string()),
    }
}

/// Ages are non-negative integers; integral floats (`25.0`) are accepted
fn cell_age(cell: &Cell) -> Result<i64, String> {
    let value = match cell {
        Cell::Empty => return Err("value is required".to_string()),
        Cell::Number(n) => *n,
        Cell::Text(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => i as f64,
                Err(_) => s
                    .parse::<f64>()
                    .map_err(|_| format!("expected an integer, got '{s}'"))?,
            }
        }
        Cell::Bool(b) => return Err(format!("expected an integer, got {b}")),
    };

    if !value.is_finite() || value.fract() != 0.0 {
        return Err(format!("expected an integer, got {value}"));
    }
    if value >= MAX_AGE_EXCLUSIVE {
        return Err(format!("age out of range: {value}"));
    }
    validate_age(value as i64)
}

fn cell_gender(cell: &Cell) -> Result<String, String> {
    match cell {
        Cell::Empty => Err("value is required".to_string()),
        Cell::Text(s) => Ok(normalize_gender(s)),
        Cell::Number(n) => Ok(format_number(*n)),
        Cell::Bool(b) => Ok(b.to_string()),
    }
}

/// Scores are nullable: an empty cell stores NULL
fn cell_score(cell: &Cell) -> Result<Option<f64>, String> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Number(n) if n.is_finite() => Ok(Some(*n)),
        Cell::Number(n) => Err(format!("expected a number, got {n}")),
        Cell::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| format!("expected a number, got '{s}'")),
        Cell::Bool(b) => Err(format!("expected a number, got {b}")),
    }
}

/// Whole numbers print without a fractional part (`25`, not `25.0`)
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{
        Categorization, FieldPair, PersonalityFactors, Respondent,
    };
    use async_trait::async_trait;

    /// In-memory store recording every upsert call
    #[derive(Default)]
    struct MemoryStore {
        respondents: Vec<Respondent>,
        personality: Vec<(i64, PersonalityScores)>,
        categories: Vec<(i64, CategoryScores)>,
        calls: Vec<&'static str>,
    }

    #[async_trait]
    impl SurveyStore for MemoryStore {
        async fn count_respondents(&mut self) -> crate::Result<i64> {
            Ok(self.respondents.len() as i64)
        }

        async fn upsert_respondent(&mut self, r: &NewRespondent) -> crate::Result<i64> {
            self.calls.push("respondent");
            if let Some(existing) = self.respondents.iter_mut().find(|e| e.name == r.name) {
                existing.age = r.age;
                existing.gender = r.gender.clone();
                return Ok(existing.id);
            }
            Ok(self.create_respondent(r).await?.id)
        }

        async fn upsert_personality_factors(
            &mut self,
            respondent_id: i64,
            scores: &PersonalityScores,
        ) -> crate::Result<()> {
            self.calls.push("personality");
            match self.personality.iter_mut().find(|(id, _)| *id == respondent_id) {
                Some(entry) => entry.1 = *scores,
                None => self.personality.push((respondent_id, *scores)),
            }
            Ok(())
        }

        async fn upsert_categorization(
            &mut self,
            respondent_id: i64,
            scores: &CategoryScores,
        ) -> crate::Result<()> {
            self.calls.push("categorization");
            match self.categories.iter_mut().find(|(id, _)| *id == respondent_id) {
                Some(entry) => entry.1 = *scores,
                None => self.categories.push((respondent_id, *scores)),
            }
            Ok(())
        }

        async fn list_respondents(&mut self) -> crate::Result<Vec<Respondent>> {
            Ok(self.respondents.clone())
        }

        async fn get_respondent(&mut self, id: i64) -> crate::Result<Option<Respondent>> {
            Ok(self.respondents.iter().find(|r| r.id == id).cloned())
        }

        async fn create_respondent(&mut self, r: &NewRespondent) -> crate::Result<Respondent> {
            let respondent = Respondent {
                id: self.respondents.iter().map(|r| r.id).max().unwrap_or(0) + 1,
                name: r.name.clone(),
                age: r.age,
                gender: r.gender.clone(),
            };
            self.respondents.push(respondent.clone());
            Ok(respondent)
        }

        async fn delete_respondent(&mut self, id: i64) -> crate::Result<bool> {
            let before = self.respondents.len();
            self.respondents.retain(|r| r.id != id);
            self.personality.retain(|(rid, _)| *rid != id);
            self.categories.retain(|(rid, _)| *rid != id);
            Ok(self.respondents.len() < before)
        }

        async fn personality_factors_for(
            &mut self,
            _respondent_id: i64,
        ) -> crate::Result<Vec<PersonalityFactors>> {
            unimplemented!("not used by ingestion")
        }

        async fn categorizations_for(
            &mut self,
            _respondent_id: i64,
        ) -> crate::Result<Vec<Categorization>> {
            unimplemented!("not used by ingestion")
        }

        async fn personality_factor_pairs(
            &mut self,
            _first: PersonalityFactor,
            _second: PersonalityFactor,
            _respondent_id: Option<i64>,
        ) -> crate::Result<Vec<FieldPair>> {
            unimplemented!("not used by ingestion")
        }

        async fn category_pairs(
            &mut self,
            _first: Category,
            _second: Category,
            _respondent_id: Option<i64>,
        ) -> crate::Result<Vec<FieldPair>> {
            unimplemented!("not used by ingestion")
        }
    }

    fn header() -> Vec<String> {
        required_columns().into_iter().map(String::from).collect()
    }

    /// Full row: scores count up from `first_score`
    fn row(name: &str, age: i64, gender: &str, first_score: i64) -> Vec<Cell> {
        let mut cells = vec![Cell::text(name), Cell::from(age), Cell::text(gender)];
        let score_count = PersonalityFactor::ALL.len() + Category::ALL.len();
        cells.extend((0..score_count as i64).map(|i| Cell::from(first_score + i)));
        cells
    }

    fn sheet(rows: Vec<Vec<Cell>>) -> Table {
        Table::new(header(), rows)
    }

    #[test]
    fn test_required_columns() {
        let columns = required_columns();
        assert_eq!(columns.len(), 29);
        assert_eq!(&columns[..4], &["name", "age", "gender", "A"]);
        assert_eq!(columns[18], "Q4");
        assert_eq!(columns[19], "An");
        assert_eq!(columns[28], "Ac");
        assert!(!columns.contains(&"D"));
    }

    #[test]
    fn test_normalize_gender() {
        assert_eq!(normalize_gender("masculino"), "M");
        assert_eq!(normalize_gender("Masculino"), "M");
        assert_eq!(normalize_gender(" masculino "), "M");
        assert_eq!(normalize_gender("FEMENINO"), "F");
        // canonical codes are left alone
        assert_eq!(normalize_gender("M"), "M");
        assert_eq!(normalize_gender("F"), "F");
        // unrecognized values pass through with original casing/spacing
        assert_eq!(normalize_gender("Male"), "Male");
        assert_eq!(normalize_gender(" Otro "), " Otro ");
    }

    #[test]
    fn test_missing_columns_reports_all() {
        let table = Table::new(
            vec!["name".into(), "age".into()],
            vec![vec![Cell::text("John Doe"), Cell::from(25i64)]],
        );

        let missing = missing_columns(&table);
        assert_eq!(missing.len(), 27);
        assert_eq!(missing[0], "gender");
        assert!(missing.contains(&"Q4".to_string()));
        assert!(missing.contains(&"Ac".to_string()));

        match plan_import(&table, 0) {
            Err(IngestError::MissingColumns(cols)) => assert_eq!(cols, missing),
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_counter_only_advances_for_empty_names() {
        let table = sheet(vec![
            row("", 20, "M", 1),
            row("Ana", 21, "F", 1),
            row("", 22, "F", 1),
            row("", 23, "M", 1),
        ]);

        let plan = plan_import(&table, 4).unwrap();
        let names: Vec<&str> = plan.rows.iter().map(|r| r.respondent.name.as_str()).collect();
        assert_eq!(names, ["Estudiante 5", "Ana", "Estudiante 6", "Estudiante 7"]);
        assert_eq!(
            plan.rows.iter().map(|r| r.placeholder_name).collect::<Vec<_>>(),
            [true, false, true, true]
        );
    }

    #[test]
    fn test_scores_map_to_vocabulary() {
        let plan = plan_import(&sheet(vec![row("John Doe", 25, "Male", 1)]), 0).unwrap();
        let upserts = &plan.rows[0];

        assert_eq!(upserts.respondent.gender, "Male");
        assert_eq!(upserts.personality.get(PersonalityFactor::A), Some(1.0));
        assert_eq!(upserts.personality.get(PersonalityFactor::E), Some(4.0));
        assert_eq!(upserts.personality.get(PersonalityFactor::Q4), Some(16.0));
        assert_eq!(upserts.categories.get(Category::An), Some(17.0));
        assert_eq!(upserts.categories.get(Category::Ac), Some(26.0));
    }

    #[test]
    fn test_columns_found_by_name_not_position() {
        let mut columns = header();
        columns.reverse();
        let mut cells = row("Ana", 30, "femenino", 1);
        cells.reverse();

        let plan = plan_import(&Table::new(columns, vec![cells]), 0).unwrap();
        let upserts = &plan.rows[0];
        assert_eq!(upserts.respondent.name, "Ana");
        assert_eq!(upserts.respondent.age, 30);
        assert_eq!(upserts.respondent.gender, "F");
        assert_eq!(upserts.personality.get(PersonalityFactor::A), Some(1.0));
    }

    #[test]
    fn test_empty_score_cells_become_null() {
        let mut cells = row("Ana", 30, "F", 1);
        cells[3] = Cell::Empty;
        let plan = plan_import(&sheet(vec![cells]), 0).unwrap();
        assert_eq!(plan.rows[0].personality.get(PersonalityFactor::A), None);
        assert_eq!(plan.rows[0].personality.get(PersonalityFactor::B), Some(2.0));
    }

    #[test]
    fn test_text_cells_are_parsed() {
        let mut cells = row("Ana", 30, "F", 1);
        cells[1] = Cell::text(" 31 ");
        cells[4] = Cell::text("2.5");
        let plan = plan_import(&sheet(vec![cells]), 0).unwrap();
        assert_eq!(plan.rows[0].respondent.age, 31);
        assert_eq!(plan.rows[0].personality.get(PersonalityFactor::B), Some(2.5));
    }

    #[test]
    fn test_numeric_name_formats_without_fraction() {
        let mut cells = row("", 30, "F", 1);
        cells[0] = Cell::Number(1234.0);
        let plan = plan_import(&sheet(vec![cells]), 0).unwrap();
        assert_eq!(plan.rows[0].respondent.name, "1234");
        assert!(!plan.rows[0].placeholder_name);
    }

    #[test]
    fn test_non_numeric_score_is_reported_with_line() {
        let mut bad = row("Luis", 22, "M", 1);
        bad[5] = Cell::text("alto");
        let table = sheet(vec![row("Ana", 21, "F", 1), bad]);

        match plan_import(&table, 0) {
            Err(IngestError::InvalidCell { line, column, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "C");
            }
            other => panic!("expected InvalidCell, got {other:?}"),
        }
    }

    #[test]
    fn test_age_must_be_integral() {
        let mut cells = row("Ana", 21, "F", 1);
        cells[1] = Cell::Number(21.5);
        let result = plan_import(&sheet(vec![cells]), 0);
        assert!(matches!(result, Err(IngestError::InvalidCell { ref column, .. }) if column == "age"));

        let mut cells = row("Ana", 21, "F", 1);
        cells[1] = Cell::Empty;
        let result = plan_import(&sheet(vec![cells]), 0);
        assert!(matches!(result, Err(IngestError::InvalidCell { ref column, .. }) if column == "age"));
    }

    #[test]
    fn test_age_out_of_range_is_rejected() {
        for age in [Cell::Number(1e30), Cell::text("1e30"), Cell::Number(-1e30)] {
            let mut cells = row("Ana", 21, "F", 1);
            cells[1] = age.clone();
            let result = plan_import(&sheet(vec![cells]), 0);
            assert!(
                matches!(result, Err(IngestError::InvalidCell { ref column, .. }) if column == "age"),
                "{age:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_negative_age_is_rejected() {
        for age in [Cell::from(-3i64), Cell::text("-3")] {
            let mut cells = row("Ana", 21, "F", 1);
            cells[1] = age;
            match plan_import(&sheet(vec![cells]), 0) {
                Err(IngestError::InvalidCell { column, message, .. }) => {
                    assert_eq!(column, "age");
                    assert!(message.contains("negative"));
                }
                other => panic!("expected age error, got {other:?}"),
            }
        }

        let mut cells = row("Ana", 21, "F", 1);
        cells[1] = Cell::text("0");
        let plan = plan_import(&sheet(vec![cells]), 0).unwrap();
        assert_eq!(plan.rows[0].respondent.age, 0);
    }

    #[tokio::test]
    async fn test_import_issues_three_upserts_per_row() {
        let mut store = MemoryStore::default();
        let table = sheet(vec![row("Ana", 21, "F", 1), row("", 22, "masculino", 2)]);

        let summary = import_table(&mut store, &table).await.unwrap();

        assert_eq!(summary.rows_processed, 2);
        assert_eq!(summary.placeholder_names, 1);
        assert_eq!(
            store.calls,
            [
                "respondent",
                "personality",
                "categorization",
                "respondent",
                "personality",
                "categorization"
            ]
        );
        assert_eq!(store.respondents[1].name, "Estudiante 1");
        assert_eq!(store.respondents[1].gender, "M");
    }

    #[tokio::test]
    async fn test_placeholder_counter_starts_after_existing_respondents() {
        let mut store = MemoryStore::default();
        for name in ["Ana", "Luis", "Marta"] {
            store
                .create_respondent(&NewRespondent {
                    name: name.to_string(),
                    age: 20,
                    gender: "F".to_string(),
                })
                .await
                .unwrap();
        }

        import_table(&mut store, &sheet(vec![row("", 22, "M", 1)]))
            .await
            .unwrap();

        assert_eq!(store.respondents.last().unwrap().name, "Estudiante 4");
    }

    #[tokio::test]
    async fn test_repeated_names_collapse_into_one_respondent() {
        let mut store = MemoryStore::default();
        let table = sheet(vec![row("Ana", 21, "F", 1), row("Ana", 35, "F", 100)]);

        import_table(&mut store, &table).await.unwrap();

        assert_eq!(store.respondents.len(), 1);
        assert_eq!(store.respondents[0].age, 35);
        assert_eq!(store.personality.len(), 1);
        assert_eq!(store.personality[0].1.get(PersonalityFactor::A), Some(100.0));
        assert_eq!(store.categories.len(), 1);
    }

    #[tokio::test]
    async fn test_names_match_case_sensitively() {
        let mut store = MemoryStore::default();
        let table = sheet(vec![row("ana", 21, "F", 1), row("Ana", 21, "F", 1)]);

        import_table(&mut store, &table).await.unwrap();
        assert_eq!(store.respondents.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_sheet_writes_nothing() {
        let mut store = MemoryStore::default();
        let mut bad = row("Luis", 22, "M", 1);
        bad[10] = Cell::Bool(true);
        let table = sheet(vec![row("Ana", 21, "F", 1), bad]);

        let result = import_table(&mut store, &table).await;

        assert!(matches!(result, Err(IngestError::InvalidCell { .. })));
        assert!(store.calls.is_empty());
        assert!(store.respondents.is_empty());
    }

    #[tokio::test]
    async fn test_missing_columns_write_nothing() {
        let mut store = MemoryStore::default();
        let table = Table::new(vec!["name".into()], vec![vec![Cell::text("Ana")]]);

        let result = import_table(&mut store, &table).await;

        assert!(matches!(result, Err(IngestError::MissingColumns(_))));
        assert!(store.calls.is_empty());
    }
}
