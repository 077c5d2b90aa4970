use clap::Parser;
use crossword_csp::backtracking_search::{find_fill, FillFailure, FillOptions};
use crossword_csp::grid_config::{
    generate_grid_config_from_template_string, parse_structure, render_grid,
};
use crossword_csp::word_list::{WordList, WordListSourceConfig};
use std::fmt::{Debug, Formatter};
use std::fs;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// crossword_csp: Fill a crossword structure from a word list
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the structure file, with _ representing fillable cells and any other character
    /// (e.g. #) representing blocks
    structure: String,

    /// Path to the word list file, one word per line with an optional ";score" suffix
    words: String,

    /// Minimum allowable word score [default: none]
    #[arg(long)]
    min_score: Option<i32>,

    /// Give up after this many seconds [default: none]
    #[arg(long)]
    timeout: Option<u64>,

    /// Explore candidates for the first slot in parallel
    #[arg(long)]
    parallel: bool,
}

struct Error(String);

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0) // Print error unquoted
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let template = fs::read_to_string(&args.structure)
        .map_err(|_| Error(format!("Couldn't read file '{}'", args.structure)))?;

    // No word longer than the grid's longest side can ever fit.
    let structure = parse_structure(&template).map_err(|error| Error(error.to_string()))?;
    let max_side = structure.len().max(structure.first().map_or(0, Vec::len));

    let word_list = WordList::new(
        &[WordListSourceConfig::File {
            id: "0".into(),
            path: args.words.clone().into(),
        }],
        Some(max_side),
        args.min_score,
    );

    #[allow(clippy::comparison_chain)]
    if let Some(errors) = word_list.get_source_errors().get("0") {
        if errors.len() == 1 {
            return Err(Error(format!("{}", errors[0])));
        } else if errors.len() > 1 {
            let mut full_error: String = "".into();
            for error in errors {
                full_error.push_str(&format!("\n- {error}"));
            }
            return Err(Error(full_error));
        }
    }

    if word_list.is_empty() {
        return Err(Error("Word list is empty".into()));
    }

    let grid_config = generate_grid_config_from_template_string(word_list, &template)
        .map_err(|error| Error(error.to_string()))?;

    let options = FillOptions {
        timeout: args.timeout.map(Duration::from_secs),
        abort: None,
        parallel: args.parallel,
    };

    match find_fill(&grid_config, &options) {
        Ok(result) => println!("{}", render_grid(&grid_config, &result.assignment)),
        Err(FillFailure::HardFailure) => println!("No solution."),
        Err(FillFailure::Timeout) => return Err(Error("Timed out before finding a fill".into())),
        Err(FillFailure::Abort) => return Err(Error("Fill was aborted".into())),
    }

    Ok(())
}
