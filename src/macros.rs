/// A lazily compiled, process-wide `Regex` for a literal pattern.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Build a [`RuleStub`](crate::RuleStub).
///
/// ```ignore
/// stub! {
///     name: "7.3.86",
///     center: Filter::last("iu"),
///     op: OpRef::Same,
///     flags: StubFlags::OPTIONAL,
/// }
/// ```
///
/// Context entries accept anything convertible into a [`Cond`](crate::Cond)
/// (a `Filter` extends the base). Omitted slots inherit the section base.
#[macro_export]
macro_rules! stub {
    (@center) => {
        $crate::Cond::Base
    };
    (@center $center:expr) => {
        $crate::Cond::from($center)
    };
    (
        name: $name:expr
        $(, left: [ $($left:expr),* $(,)? ])?
        $(, center: $center:expr)?
        $(, right: [ $($right:expr),* $(,)? ])?
        , op: $op:expr
        $(, flags: $flags:expr)?
        $(, priority: $priority:expr)?
        $(,)?
    ) => {{
        $crate::RuleStub {
            name: ::std::string::String::from($name),
            left: vec![ $($($crate::Cond::from($left)),*)? ],
            center: $crate::stub!(@center $($center)?),
            right: vec![ $($($crate::Cond::from($right)),*)? ],
            operator: $crate::OpRef::from($op),
            flags: $crate::StubFlags::empty() $(| $flags)?,
            priority: { 0 $(+ $priority)? },
        }
    }};
}
