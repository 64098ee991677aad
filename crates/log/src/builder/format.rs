//! Format layer creation macros

/// Apply the display toggles shared by every format and box the layer.
macro_rules! create_fmt_layer {
    ($layer:expr, $display:expr) => {{
        let layer = $layer
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids);

        if $display.time {
            Box::new(layer) as BoxedLayer
        } else {
            Box::new(layer.without_time()) as BoxedLayer
        }
    }};
}

/// JSON layer with its extra span options.
macro_rules! create_json_layer {
    ($writer:expr, $display:expr) => {{
        create_fmt_layer!(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer($writer)
                .with_current_span(true)
                .with_span_list($display.span_list)
                .flatten_event($display.flatten),
            $display
        )
    }};
}
