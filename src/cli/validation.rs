use crate::cli::args::{CliArgs, Command};
use crate::schema;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid --timeout, expected a positive number of seconds".to_string());
        }
    }

    let sources = [&args.token, &args.token_file, &args.token_env]
        .iter()
        .filter(|s| s.is_some())
        .count();
    if sources > 1 {
        return Err("use only one of --token, --token-file, --token-env".to_string());
    }

    match &args.command {
        Command::List { record_type }
        | Command::View { record_type, .. }
        | Command::Delete { record_type, .. }
        | Command::Export { record_type, .. } => {
            check_record_type(record_type)?;
        }
        Command::Create {
            record_type,
            fields,
        }
        | Command::Edit {
            record_type,
            fields,
            ..
        } => {
            let rt = check_record_type(record_type)?;
            for pair in fields {
                let (name, _) = parse_field_pair(pair)?;
                if rt.field(&name).is_none() {
                    return Err(format!(
                        "unknown field '{name}' for record type '{}'",
                        rt.key
                    ));
                }
            }
        }
        Command::Types | Command::Profile { .. } => {}
    }
    Ok(())
}

pub fn check_record_type(key: &str) -> Result<schema::RecordType, String> {
    schema::find(key).ok_or_else(|| {
        let known = schema::builtin()
            .iter()
            .map(|rt| rt.key)
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown record type '{key}' (expected one of: {known})")
    })
}

pub fn parse_field_pair(pair: &str) -> Result<(String, String), String> {
    match pair.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid field '{pair}', expected NAME=VALUE")),
    }
}
