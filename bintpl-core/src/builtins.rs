//! `Printf`'s format-string engine: a small subset of C's specifiers, just
//! enough for diagnostic templates. No field widths, no flags.

use crate::error::{Location, TemplateError};
use crate::value::Scalar;

pub fn format_printf(fmt: &str, args: &[Scalar], loc: &Location) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_arg = args.iter();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(spec) = chars.next() else {
            return Err(TemplateError::TypeMismatch {
                message: "format string ends with a bare `%`".into(),
                location: loc.clone(),
            });
        };
        if spec == '%' {
            out.push('%');
            continue;
        }
        let arg = next_arg.next().ok_or_else(|| TemplateError::TypeMismatch {
            message: format!("not enough arguments for format specifier `%{spec}`"),
            location: loc.clone(),
        })?;
        match spec {
            'd' | 'i' => out.push_str(&arg.as_i64(loc)?.to_string()),
            'u' => out.push_str(&(arg.as_i64(loc)? as u64).to_string()),
            'x' => out.push_str(&format!("{:x}", arg.as_i64(loc)? as u64)),
            'X' => out.push_str(&format!("{:X}", arg.as_i64(loc)? as u64)),
            's' => out.push_str(&arg.to_string()),
            other => {
                return Err(TemplateError::TypeMismatch {
                    message: format!("unsupported format specifier `%{other}`"),
                    location: loc.clone(),
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t", 1)
    }

    #[test]
    fn formats_every_supported_specifier() {
        let args = vec![Scalar::Int(-1), Scalar::Int(255), Scalar::Str("hi".into())];
        let out = format_printf("%d %x %s%%", &args, &loc()).unwrap();
        assert_eq!(out, "-1 ff hi%");
    }

    #[test]
    fn missing_argument_is_an_error() {
        let err = format_printf("%d", &[], &loc()).unwrap_err();
        assert!(matches!(err, TemplateError::TypeMismatch { .. }));
    }

    #[test]
    fn trailing_percent_is_an_error() {
        let err = format_printf("abc%", &[], &loc()).unwrap_err();
        assert!(matches!(err, TemplateError::TypeMismatch { .. }));
    }
}
