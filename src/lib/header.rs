//! Output header construction and `@PG` chaining.
//!
//! The merged header takes its reference sequences and program records from the aligned input
//! (the aligner's view of the genome) and its read groups, comments and `@HD` line from the
//! unmapped input. A `@PG` record for this tool is appended to the end of the program chain.

use anyhow::Result;
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::program::tag;
use std::collections::HashSet;

/// Program name and base `@PG` ID written by this tool.
pub const PROGRAM_NAME: &str = "fgmerge";

/// Returns the ID of the program at the end of the `@PG` chain, i.e. one that no other program
/// names as its `PP`.
#[must_use]
pub fn get_last_program_id(header: &Header) -> Option<String> {
    let programs = header.programs();
    let programs = programs.as_ref();

    let referenced: HashSet<&[u8]> = programs
        .values()
        .filter_map(|pg| pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID))
        .map(AsRef::as_ref)
        .collect();

    programs
        .keys()
        .find(|id| !referenced.contains(id.as_slice()))
        .or_else(|| programs.keys().next())
        .map(|id| String::from_utf8_lossy(id).into_owned())
}

/// Returns `base_id`, or `base_id.N` for the smallest `N` not already used in the header.
#[must_use]
pub fn make_unique_program_id(header: &Header, base_id: &str) -> String {
    let programs = header.programs();
    let programs = programs.as_ref();

    if !programs.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }

    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !programs.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| base_id.to_string())
}

/// Builds the `@PG` record for this tool.
///
/// # Errors
///
/// Returns an error if the record cannot be built.
pub fn build_program_record(
    version: &str,
    command_line: &str,
    previous_program: Option<&str>,
) -> Result<Map<Program>> {
    let mut builder = Map::<Program>::builder()
        .insert(tag::NAME, PROGRAM_NAME)
        .insert(tag::VERSION, version)
        .insert(tag::COMMAND_LINE, command_line);

    if let Some(pp) = previous_program {
        builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
    }

    Ok(builder.build()?)
}

/// Appends a `@PG` record for this tool, chained to the last existing program.
///
/// # Errors
///
/// Returns an error if the record cannot be built or added.
pub fn add_pg_record(mut header: Header, version: &str, command_line: &str) -> Result<Header> {
    let previous_program = get_last_program_id(&header);
    let id = make_unique_program_id(&header, PROGRAM_NAME);
    let record = build_program_record(version, command_line, previous_program.as_deref())?;
    header.programs_mut().add(BString::from(id), record)?;
    Ok(header)
}

/// Builds the header of the merged output from the unmapped and aligned input headers.
#[must_use]
pub fn build_output_header(unmapped: &Header, aligned: &Header) -> Header {
    let mut builder = Header::builder();

    if let Some(hd) = unmapped.header() {
        builder = builder.set_header(hd.clone());
    }
    for (name, reference) in aligned.reference_sequences() {
        builder = builder.add_reference_sequence(name.clone(), reference.clone());
    }
    for (id, read_group) in unmapped.read_groups() {
        builder = builder.add_read_group(id.clone(), read_group.clone());
    }
    for (id, program) in aligned.programs().as_ref() {
        builder = builder.add_program(id.clone(), program.clone());
    }
    for comment in unmapped.comments() {
        builder = builder.add_comment(comment.clone());
    }

    builder.build()
}
