use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};
use maze_nav_core::{
    Bounds, CommandList, Coordinate, Edge, FieldConfig, Heading, ObstacleField, Path, Robot,
    World, compile, parse_maze, solve,
    world::Tile,
};
use rand::{SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

#[derive(Parser, Debug)]
#[command(version, about = "Solve a robot maze and drive the robot to an edge", long_about = None)]
struct Args {
    /// Maze file with one `x,y` wall coordinate per line
    #[arg(short, long, value_name = "MAZE_FILE")]
    maze: Option<PathBuf>,

    /// Edge to reach: top, bottom, left or right
    #[arg(short, long, default_value = "top")]
    goal: Edge,

    /// Seed for random obstacle placement
    #[arg(short, long)]
    seed: Option<u64>,

    /// Side length of random square obstacles
    #[arg(long, default_value_t = FieldConfig::default().size)]
    size: u32,

    /// Maximum number of random obstacles
    #[arg(long, default_value_t = FieldConfig::default().max_count)]
    max_obstacles: u32,

    /// Name the robot uses in its messages
    #[arg(short, long, default_value = "HAL")]
    name: String,

    /// Print the route tokens and exit
    #[arg(long, conflicts_with = "json")]
    print: bool,

    /// Print the route as JSON and exit
    #[arg(long)]
    json: bool,

    /// Write log records to this file
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn interactive(&self) -> bool {
        !self.print && !self.json
    }
}

struct App {
    /// Bounds and obstacles.
    world: World,
    /// The simulated robot.
    robot: Robot,
    name: String,
    edge: Edge,
    /// Planned path, empty when the edge is unreachable.
    path: Path,
    commands: Option<CommandList>,
    /// Index of the next command to execute.
    next_command: usize,
    /// Robot messages, newest last.
    messages: Vec<String>,
    /// Flag to control the main loop.
    should_quit: bool,
    /// Flag set once every command has run.
    finished: bool,
}

impl App {
    fn new(world: World, name: String, edge: Edge) -> Result<Self> {
        let robot = Robot::new();
        let path = solve(robot.position, edge, world.bounds, &world.field);
        let commands = path
            .as_ref()
            .map(|path| compile(path, robot.heading))
            .transpose()?;

        let mut messages = vec![format!("{}: Hello kiddo!", name)];
        match &commands {
            Some(commands) => messages.push(format!(
                "{}: Starting auto navigation to the {} edge ({} commands).",
                name,
                edge,
                commands.len()
            )),
            None => messages.push(format!(
                "{}: Sorry, I could not find a path to the {} edge.",
                name, edge
            )),
        }

        Ok(App {
            world,
            robot,
            name,
            edge,
            path: path.unwrap_or_default(),
            commands,
            next_command: 0,
            messages,
            should_quit: false,
            finished: false,
        })
    }

    /// Executes the next planned command.
    fn tick(&mut self) {
        if self.finished {
            return;
        }
        let Some(command) = self
            .commands
            .as_ref()
            .and_then(|commands| commands.commands().get(self.next_command))
        else {
            self.finished = true;
            if self.commands.is_some() {
                self.messages
                    .push(format!("{}: I am at the {} edge.", self.name, self.edge));
            }
            return;
        };

        match self.robot.execute(command, &self.world) {
            Ok(outcome) => self
                .messages
                .push(format!(" > {} {}", self.name, outcome)),
            Err(err) => {
                // The plan no longer matches the world; stop rather than push on.
                self.messages.push(format!("{}: {}", self.name, err));
                self.finished = true;
            }
        }
        self.messages.push(format!(
            " > {} now at position {}.",
            self.name, self.robot.position
        ));
        self.next_command += 1;
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let world = build_world(&args)?;

    if !args.interactive() {
        return print_route(&args, &world);
    }

    let mut app = App::new(world, args.name.clone(), args.goal)?;
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;
    result
}

/// Configures env_logger. Without a log file the TUI keeps records off the screen.
fn init_logging(args: &Args) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(log_file) = &args.log_file {
        let file = File::create(log_file)
            .with_context(|| format!("Failed to create log file {}", log_file.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    } else if args.interactive() {
        builder.filter_level(LevelFilter::Off);
    }
    builder.try_init()?;
    Ok(())
}

/// Loads the maze file when given, otherwise scatters random square obstacles.
fn build_world(args: &Args) -> Result<World> {
    let bounds = Bounds::default();
    let field = match &args.maze {
        Some(maze_file) => {
            let text = std::fs::read_to_string(maze_file)
                .with_context(|| format!("Failed to read maze file {}", maze_file.display()))?;
            let maze = parse_maze(&text)
                .with_context(|| format!("Failed to parse maze file {}", maze_file.display()))?;
            info!("Loaded maze {}: {}", maze_file.display(), maze);
            ObstacleField::from_obstacles(vec![maze])
        }
        None => {
            let config = FieldConfig {
                size: args.size,
                max_count: args.max_obstacles,
                ..FieldConfig::default()
            };
            let mut rng = match args.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            ObstacleField::generate(bounds, &config, &mut rng)
        }
    };
    Ok(World::new(bounds, field))
}

/// Non-interactive output: the obstacle listing and route, as text or JSON.
fn print_route(args: &Args, world: &World) -> Result<()> {
    let robot = Robot::new();
    let path = solve(robot.position, args.goal, world.bounds, &world.field);
    let commands = path
        .as_ref()
        .map(|path| compile(path, robot.heading))
        .transpose()?;

    if args.json {
        let report = serde_json::json!({
            "goal": args.goal,
            "obstacles": world.field.obstacles(),
            "path": path,
            "commands": commands.as_ref().map(CommandList::tokens),
            "final_heading": commands.as_ref().map(CommandList::final_heading),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !world.field.is_empty() {
        println!("There are some obstacles:");
        for obstacle in world.field.obstacles() {
            println!("- {}", obstacle);
        }
    }
    match commands {
        Some(commands) => {
            for token in commands.tokens() {
                println!("{}", token);
            }
        }
        None => println!(
            "{}: Sorry, I could not find a path to the {} edge.",
            args.name, args.goal
        ),
    }
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(frame.area());
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(45),
            Constraint::Percentage(10),
        ])
        .split(columns[1]);

    render_map(frame, columns[0], app);
    render_commands(frame, side[0], app);
    render_messages(frame, side[1], app);

    let status = if app.finished {
        "Done. Press 'q' or 'Esc' to quit."
    } else {
        "Driving... Press 'q' or 'Esc' to quit."
    };
    let help_text = Paragraph::new(status)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, side[2]);
}

/// Higher wins when several world cells share one screen cell.
fn tile_priority(tile: &Tile) -> u8 {
    match tile {
        Tile::Open => 0,
        Tile::Path => 1,
        Tile::Obstacle => 2,
        Tile::Robot(_) => 3,
    }
}

fn tile_span(tile: Tile) -> Span<'static> {
    match tile {
        Tile::Open => Span::raw(" "),
        Tile::Path => Span::styled(".", Style::default().fg(Color::Green)),
        Tile::Obstacle => Span::styled("#", Style::default().fg(Color::DarkGray)),
        Tile::Robot(heading) => {
            let glyph = match heading {
                Heading::North => "^",
                Heading::East => ">",
                Heading::South => "v",
                Heading::West => "<",
            };
            Span::styled(glyph, Style::default().fg(Color::Red).bold())
        }
    }
}

/// Renders the world scaled down to fit the area, +y at the top.
fn render_map(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(format!("Maze ({} edge)", app.edge))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let raster = app.world.raster(&app.path, &app.robot);
    let bounds = raster.bounds();
    let scale_x = raster.width().div_ceil(inner.width as usize).max(1) as i32;
    let scale_y = raster.height().div_ceil(inner.height as usize).max(1) as i32;

    let mut lines: Vec<Line> = Vec::with_capacity(inner.height as usize);
    let mut top = bounds.max_y;
    while top >= bounds.min_y {
        let mut spans: Vec<Span> = Vec::with_capacity(inner.width as usize);
        let mut left = bounds.min_x;
        while left <= bounds.max_x {
            let tile = (0..scale_y)
                .flat_map(|dy| (0..scale_x).map(move |dx| Coordinate::new(left + dx, top - dy)))
                .filter_map(|c| raster.get(c))
                .max_by_key(|tile| tile_priority(tile))
                .copied()
                .unwrap_or_default();
            spans.push(tile_span(tile));
            left += scale_x;
        }
        lines.push(Line::from(spans));
        top -= scale_y;
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Renders the compiled command tokens with the last executed one selected.
fn render_commands(frame: &mut Frame, area: Rect, app: &App) {
    let tokens = app
        .commands
        .as_ref()
        .map(CommandList::tokens)
        .unwrap_or_default();
    let items: Vec<ListItem> = tokens.into_iter().map(ListItem::new).collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Commands"))
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .highlight_symbol(">> ");

    let mut state = ListState::default().with_selected(app.next_command.checked_sub(1));
    frame.render_stateful_widget(list, area, &mut state);
}

/// Renders the most recent robot messages that fit.
fn render_messages(frame: &mut Frame, area: Rect, app: &App) {
    let visible = area.height.saturating_sub(2) as usize;
    let start = app.messages.len().saturating_sub(visible);
    let lines: Vec<Line> = app.messages[start..]
        .iter()
        .map(|message| Line::from(message.as_str()))
        .collect();
    let messages = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Robot"));
    frame.render_widget(messages, area);
}
